use crate::*;
use tracing::info;

pub fn run<C: Clock>(s: &Scenario<'_, C>) {
    add(s);
    wait(s);
    get(s);
    content(s, None);
    content(s, Some("malware"));
    metadata(s);
    list(s);
    vuln(s);
}

pub fn run_deletion<C: Clock>(s: &Scenario<'_, C>) {
    delete(s, false);
    delete(s, true);
}

fn add<C: Clock>(s: &Scenario<'_, C>) {
    let f = &s.settings.fixtures;
    for image in f
        .test_images
        .iter()
        .chain(&f.malware_images)
        .chain(&f.clean_images)
    {
        s.runner.run(
            Check::positive("image_add", s.inv(&["image", "add", image], ResponseShape::Array))
                .subject(format!("added image {}", image))
                .expect_field("0.image_status", "active"),
        );
    }
}

fn wait<C: Clock>(s: &Scenario<'_, C>) {
    let Some(image) = s.test_image() else {
        s.runner.skip("image_wait", "no test images configured");
        return;
    };
    s.runner.run(
        Check::positive("image_wait", s.inv(&["image", "get", &image], ResponseShape::Array))
            .subject(format!("waited for image {}", image))
            .expect_field("0.analysis_status", "analyzed")
            .gated_on(s.image_gate(&image)),
    );
}

fn get<C: Clock>(s: &Scenario<'_, C>) {
    for image in &s.settings.fixtures.test_images {
        s.runner.run(
            Check::positive("image_get", s.inv(&["image", "get", image], ResponseShape::Array))
                .subject(format!("got image {}", image)),
        );
    }
}

/// Fetches every content type the image reports, or only `only` when given.
fn content<C: Clock>(s: &Scenario<'_, C>, only: Option<&str>) {
    const ACTION: &str = "image_content";
    let pool = match only {
        Some("malware") => &s.settings.fixtures.malware_images,
        _ => &s.settings.fixtures.test_images,
    };
    let Some(image) = s.fixtures.pick(pool).cloned() else {
        s.runner.skip(ACTION, "no images configured for this content type");
        return;
    };
    if !s.runner.require(ACTION, &s.image_gate(&image)) {
        return;
    }

    let types: Vec<String> = match s
        .runner
        .query(ACTION, &s.inv(&["image", "content", &image], ResponseShape::Array))
        .map_err(|e| e.to_string())
        .and_then(|p| p.decode().map_err(|e| e.to_string()))
    {
        Ok(t) => t,
        Err(e) => {
            s.runner.fail(
                ACTION,
                Polarity::Positive,
                format!("content types of {}: {}", image, e),
            );
            return;
        }
    };
    if types.is_empty() {
        s.runner.fail(
            ACTION,
            Polarity::Positive,
            format!("no content types for image {}", image),
        );
        return;
    }
    info!("{} | content types for {}: {}", ACTION, image, types.join(", "));

    for kind in types.iter().filter(|t| only.map_or(true, |o| o == t.as_str())) {
        let fetched = s
            .runner
            .query(ACTION, &s.inv(&["image", "content", &image, kind], ResponseShape::Object))
            .map_err(|e| e.to_string())
            .and_then(|p| {
                p.lookup(&FieldPath::parse("content"))
                    .map_err(|e| e.to_string())
            });
        match fetched {
            Ok(items) => info!(
                "{} | found {} item(s) of content type {} in {}",
                ACTION,
                items.as_array().map_or(0, Vec::len),
                kind,
                image
            ),
            Err(e) => {
                s.runner.fail(
                    ACTION,
                    Polarity::Positive,
                    format!("content type {} of {}: {}", kind, image, e),
                );
                return;
            }
        }
    }
    s.runner.pass(
        ACTION,
        Polarity::Positive,
        format!("{} content type(s) tested successfully", only.unwrap_or("all")),
    );
}

/// The bare metadata listing is an array of type names.
fn names_metadata_type(listing: &Payload, key: &str) -> bool {
    match listing {
        Payload::Array(items) => items.iter().any(|v| v.as_str() == Some(key)),
        _ => false,
    }
}

fn metadata<C: Clock>(s: &Scenario<'_, C>) {
    const ACTION: &str = "image_metadata";
    let Some(image) = s.test_image() else {
        s.runner.skip(ACTION, "no test images configured");
        return;
    };
    if !s.runner.require(ACTION, &s.image_gate(&image)) {
        return;
    }
    let listing = match s
        .runner
        .query(ACTION, &s.inv(&["image", "metadata", &image], ResponseShape::Array))
    {
        Ok(p) => p,
        Err(e) => {
            s.runner.fail(
                ACTION,
                Polarity::Positive,
                format!("failed to get image metadata for {}: {}", image, e),
            );
            return;
        }
    };

    let mut failed = false;
    for key in &s.settings.fixtures.metadata_types {
        if !names_metadata_type(&listing, key) {
            failed = true;
            s.runner.fail(
                ACTION,
                Polarity::Positive,
                format!("{} metadata type was not found for {}", key, image),
            );
        }
        let bucket = s.runner.run(
            Check::positive(
                ACTION,
                s.inv(&["image", "metadata", &image, key], ResponseShape::Object),
            )
            .subject(format!("metadata {} of {}", key, image))
            .expect_field("metadata_type", key.as_str()),
        );
        failed |= !matches!(bucket, CheckOutcome::Recorded(b) if b.passed());
    }
    if !failed {
        s.runner.pass(
            ACTION,
            Polarity::Positive,
            format!("all expected metadata types found for {}", image),
        );
    }
}

fn list<C: Clock>(s: &Scenario<'_, C>) {
    s.runner.run(
        Check::positive("image_list", s.inv(&["image", "list"], ResponseShape::Array))
            .subject("list images"),
    );
}

fn vuln<C: Clock>(s: &Scenario<'_, C>) {
    const ACTION: &str = "image_vuln";
    let Some(image) = s.test_image() else {
        s.runner.skip(ACTION, "no test images configured");
        return;
    };
    if !s.runner.require(ACTION, &s.image_gate(&image)) {
        return;
    }
    for key in &s.settings.fixtures.vulnerability_types {
        s.runner.run(
            Check::positive(
                ACTION,
                s.inv(&["image", "vuln", &image, key], ResponseShape::Object),
            )
            .subject(format!("vulnerabilities of type {} for {}", key, image))
            .expect_field("vulnerability_type", key.as_str()),
        );
    }
}

/// Without `--force` the newest image of a subscribed tag cannot be deleted; that
/// rejection stands for "still active".
fn delete<C: Clock>(s: &Scenario<'_, C>, force: bool) {
    let Some(image) = s.test_image() else {
        s.runner.skip("image_del", "no test images configured");
        return;
    };
    let check = if force {
        Check::positive(
            "image_del",
            s.inv(&["image", "del", "--force", &image], ResponseShape::Object),
        )
        .subject(format!("delete image {}", image))
    } else {
        Check::negative("image_del", s.inv(&["image", "del", &image], ResponseShape::Object))
            .subject(format!("delete image {} without forcing", image))
            .tolerate(
                ExpectedFailure::new(
                    "active",
                    &format!("could not delete image without forcing: {} (good)", image),
                )
                .message(IMAGE_DELETE_LATEST_TAG),
            )
    };
    s.runner.run(
        check
            .expect_field("status", "deleting")
            .gated_on(s.image_gate(&image)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_listing_names_types_by_entry() {
        let listing = Payload::Array(vec![json!("manifest"), json!("dockerfile")]);
        assert!(names_metadata_type(&listing, "manifest"));
        assert!(!names_metadata_type(&listing, "docker_history"));
        assert!(!names_metadata_type(&Payload::Array(vec![json!({"manifest": []})]), "manifest"));
        assert!(!names_metadata_type(&Payload::Empty, "manifest"));
    }
}
