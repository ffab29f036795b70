use crate::*;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ImageRecord {
    #[serde(default)]
    image_detail: Vec<ImageDetail>,
}

#[derive(Debug, Deserialize)]
struct ImageDetail {
    repo: String,
    tag: String,
    digest: String,
}

/// `repo:tag` and digest of the first detail entry of the first record.
fn first_detail(payload: &Payload) -> Result<(String, String), ExtractError> {
    let records: Vec<ImageRecord> = payload.decode()?;
    records
        .iter()
        .find_map(|r| r.image_detail.first())
        .map(|d| (format!("{}:{}", d.repo, d.tag), d.digest.clone()))
        .ok_or(ExtractError::Missing {
            path: "0.image_detail.0".to_string(),
        })
}

/// Resolves a test image to its digest, recording a failure when that is impossible.
fn pick_digest<C: Clock>(s: &Scenario<'_, C>, action: &str) -> Option<(String, String)> {
    let Some(image) = s.test_image() else {
        s.runner.skip(action, "no test images configured");
        return None;
    };
    let resolved = s
        .runner
        .query(action, &s.inv(&["image", "get", &image], ResponseShape::Array))
        .map_err(|e| e.to_string())
        .and_then(|p| first_detail(&p).map_err(|e| e.to_string()));
    match resolved {
        Ok(found) => Some(found),
        Err(e) => {
            s.runner
                .fail(action, Polarity::Positive, format!("error {}", e));
            None
        }
    }
}

pub fn run_analysis_archive<C: Clock>(s: &Scenario<'_, C>) {
    archive_add(s);
    archive_del(s);
}

fn archive_add<C: Clock>(s: &Scenario<'_, C>) {
    const ACTION: &str = "analysis_archive_images_add";
    let Some((image, digest)) = pick_digest(s, ACTION) else {
        return;
    };
    s.runner.run(
        Check::positive(
            ACTION,
            s.inv(&["analysis-archive", "images", "add", &digest], ResponseShape::Array),
        )
        .subject(format!("archived image {}", image))
        .expect_field("0.status", "archived")
        .gated_on(s.image_gate(&image)),
    );
}

/// An empty response means it was deleted; a 404 means it was never archived. Both are fine.
fn archive_del<C: Clock>(s: &Scenario<'_, C>) {
    const ACTION: &str = "analysis_archive_images_del";
    let Some((image, digest)) = pick_digest(s, ACTION) else {
        return;
    };
    let emptied = Extract::custom(|p| {
        Ok(serde_json::Value::from(if p.is_empty() {
            STATE_OK
        } else {
            STATE_NOT_OK
        }))
    });
    s.runner.run(
        Check::positive(
            ACTION,
            s.inv(&["analysis-archive", "images", "del", &digest], ResponseShape::Array),
        )
        .subject(format!("deleted image {} from archive", image))
        .expect(emptied, STATE_OK)
        .tolerate(
            ExpectedFailure::new(
                STATE_OK,
                &format!("image {} was not in the archive", image),
            )
            .httpcode(HTTP_NOT_FOUND),
        )
        .gated_on(s.image_gate(&image)),
    );
}

pub fn run_evaluate<C: Clock>(s: &Scenario<'_, C>) {
    const ACTION: &str = "evaluate_check";
    let Some(image) = s.test_image() else {
        s.runner.skip(ACTION, "no test images configured");
        return;
    };
    s.runner.run(
        Check::positive(ACTION, s.inv(&["evaluate", "check", &image], ResponseShape::Array))
            .subject(format!("evaluated image {}", image))
            .expect(Extract::NonEmpty, STATE_OK)
            .gated_on(s.image_gate(&image)),
    );
}
