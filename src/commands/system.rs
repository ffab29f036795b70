use crate::*;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct SystemStatus {
    #[serde(default)]
    service_states: Vec<ServiceState>,
}

#[derive(Debug, Deserialize)]
struct ServiceState {
    servicename: String,
    #[serde(default)]
    service_detail: Value,
}

impl ServiceState {
    /// `service_detail` is either a plain string or an object with an `up` flag.
    fn up(&self) -> String {
        match &self.service_detail {
            Value::Object(m) => m.get("up").map(display_state).unwrap_or_default(),
            other => display_state(other),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorCode {
    name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Feed {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<FeedGroup>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FeedGroup {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub record_count: Option<u64>,
}

/// First (feed, group) pair satisfying `pred`, in listing order.
pub fn find_first<'a>(
    feeds: &'a [Feed],
    pred: impl Fn(&FeedGroup) -> bool,
) -> Option<(&'a Feed, &'a FeedGroup)> {
    feeds
        .iter()
        .find_map(|f| f.groups.iter().find(|g| pred(g)).map(|g| (f, g)))
}

/// Polls `system status` until the service answers. Never records anything.
pub fn wait_for_service<C: Clock>(s: &Scenario<'_, C>) -> bool {
    let (timeout, interval) = s.settings.system_wait();
    info!("system_wait | waiting for the service at {}", s.settings.api_url);
    let gate = Gate::new(
        "system_wait",
        s.inv(&["system", "status"], ResponseShape::Object),
        Extract::Succeeded,
        STATE_OK,
    )
    .every(timeout, interval);
    let ready = s.runner.ready(&gate);
    if !ready {
        warn!("system_wait | service not ready; running checks anyway");
    }
    ready
}

pub fn run<C: Clock>(s: &Scenario<'_, C>) {
    status(s);
    errorcodes(s);
}

fn status<C: Clock>(s: &Scenario<'_, C>) {
    const ACTION: &str = "system_status";
    let result = s
        .runner
        .query(ACTION, &s.inv(&["system", "status"], ResponseShape::Object))
        .map_err(|e| e.to_string())
        .and_then(|p| p.decode::<SystemStatus>().map_err(|e| e.to_string()));
    match result {
        Ok(status) => {
            for svc in &status.service_states {
                info!("{} | service: {}; up: {}", ACTION, svc.servicename, svc.up());
            }
            s.runner.pass(
                ACTION,
                Polarity::Positive,
                format!("{} services found", status.service_states.len()),
            );
        }
        Err(e) => {
            s.runner.fail(
                ACTION,
                Polarity::Positive,
                format!("failed to get system status: {}", e),
            );
        }
    }
}

fn errorcodes<C: Clock>(s: &Scenario<'_, C>) {
    const ACTION: &str = "system_errorcodes";
    let result = s
        .runner
        .query(ACTION, &s.inv(&["system", "errorcodes"], ResponseShape::Array))
        .map_err(|e| e.to_string())
        .and_then(|p| p.decode::<Vec<ErrorCode>>().map_err(|e| e.to_string()));
    match result {
        Ok(codes) => {
            for code in &codes {
                debug!("{} | error code: {}", ACTION, code.name);
            }
            s.runner.pass(
                ACTION,
                Polarity::Positive,
                format!("{} error codes found", codes.len()),
            );
        }
        Err(e) => {
            s.runner.fail(
                ACTION,
                Polarity::Positive,
                format!("failed to get system error codes: {}", e),
            );
        }
    }
}

fn feeds<C: Clock>(s: &Scenario<'_, C>, action: &str) -> Result<Vec<Feed>, String> {
    s.runner
        .query(action, &s.inv(&["system", "feeds", "list"], ResponseShape::Array))
        .map_err(|e| e.to_string())?
        .decode()
        .map_err(|e| e.to_string())
}

pub fn run_feeds<C: Clock>(s: &Scenario<'_, C>) {
    feeds_list(s);
    // end on a disabled group so the delete below has something to remove
    for enable in [false, true, false, true, false] {
        feeds_toggle(s, enable);
    }
    feeds_delete(s);
}

fn feeds_list<C: Clock>(s: &Scenario<'_, C>) {
    const ACTION: &str = "system_feeds_list";
    match feeds(s, ACTION) {
        Ok(list) => {
            for feed in &list {
                debug!("{} | feed: {}", ACTION, feed.name);
                for group in &feed.groups {
                    debug!(
                        "{} |     group: {}; records: {}",
                        ACTION,
                        group.name,
                        group.record_count.unwrap_or_default()
                    );
                }
            }
            s.runner.pass(
                ACTION,
                Polarity::Positive,
                format!("{} feeds found", list.len()),
            );
        }
        Err(e) => {
            s.runner.fail(
                ACTION,
                Polarity::Positive,
                format!("failed to list feeds: {}", e),
            );
        }
    }
}

fn feeds_toggle<C: Clock>(s: &Scenario<'_, C>, enable: bool) {
    const ACTION: &str = "system_feeds_config_toggle";
    let (looking_for, flag) = if enable {
        ("disabled", "--enable")
    } else {
        ("enabled", "--disable")
    };
    let list = match feeds(s, ACTION) {
        Ok(l) => l,
        Err(e) => {
            s.runner.fail(
                ACTION,
                Polarity::Positive,
                format!("failed to list feeds: {}", e),
            );
            return;
        }
    };
    let Some((feed, group)) = find_first(&list, |g| g.enabled != enable) else {
        s.runner
            .skip(ACTION, &format!("no {} group in any feed", looking_for));
        return;
    };
    s.runner.run(
        Check::positive(
            ACTION,
            s.inv(
                &["system", "feeds", "config", "--group", &group.name, flag, &feed.name],
                ResponseShape::Array,
            ),
        )
        .subject(format!("feed {} group {}", feed.name, group.name))
        .expect_field("0.enabled", enable),
    );
}

/// A deleted group reports `enabled: false`.
fn feeds_delete<C: Clock>(s: &Scenario<'_, C>) {
    const ACTION: &str = "system_feeds_delete";
    let list = match feeds(s, ACTION) {
        Ok(l) => l,
        Err(e) => {
            s.runner.fail(
                ACTION,
                Polarity::Positive,
                format!("failed to list feeds: {}", e),
            );
            return;
        }
    };
    let Some((feed, group)) = find_first(&list, |g| !g.enabled) else {
        s.runner.skip(ACTION, "no disabled group in any feed");
        return;
    };
    s.runner.run(
        Check::positive(
            ACTION,
            s.inv(
                &["system", "feeds", "delete", "--group", &group.name, &feed.name],
                ResponseShape::Array,
            ),
        )
        .subject(format!("deleted feed {} group {}", feed.name, group.name))
        .expect_field("0.enabled", false),
    );
}
