use crate::*;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
struct Subscription {
    subscription_key: String,
    subscription_type: String,
}

pub fn run<C: Clock>(s: &Scenario<'_, C>) {
    s.runner.run(
        Check::positive(
            "subscription_list",
            s.inv(&["subscription", "list"], ResponseShape::Array),
        )
        .subject("list subscriptions"),
    );
    toggle(s, "activate", true);
    toggle(s, "deactivate", false);
}

fn pick_one<C: Clock>(s: &Scenario<'_, C>, action: &str) -> Result<Option<Subscription>, String> {
    let subs: Vec<Subscription> = s
        .runner
        .query(action, &s.inv(&["subscription", "list"], ResponseShape::Array))
        .map_err(|e| e.to_string())?
        .decode()
        .map_err(|e| e.to_string())?;
    Ok(s.fixtures.pick(&subs).cloned())
}

fn toggle<C: Clock>(s: &Scenario<'_, C>, verb: &str, active: bool) {
    let action = format!("subscription_{}", verb);
    let sub = match pick_one(s, &action) {
        Ok(Some(sub)) => sub,
        Ok(None) => {
            s.runner.skip(&action, "no subscriptions to pick from");
            return;
        }
        Err(e) => {
            s.runner.fail(
                &action,
                Polarity::Positive,
                format!("failed to list subscriptions: {}", e),
            );
            return;
        }
    };
    let wanted = if active { "active" } else { "not active" };
    s.runner.run(
        Check::positive(
            &action,
            s.inv(
                &["subscription", verb, &sub.subscription_type, &sub.subscription_key],
                ResponseShape::Array,
            ),
        )
        .subject(format!(
            "subscription {}/{} should be {}",
            sub.subscription_type, sub.subscription_key, wanted
        ))
        .expect_field("0.active", active),
    );
}
