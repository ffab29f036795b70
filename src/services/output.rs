use crate::domain::models::{ErrorBody, JsonErr, JsonOut, Summary};
use serde::Serialize;

pub fn print_one<T: Serialize>(
    json: bool,
    ok: bool,
    data: T,
    text: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok, data })?
        );
    } else {
        print!("{}", text(&data));
    }
    Ok(())
}

pub fn print_summary(json: bool, summary: &Summary) -> anyhow::Result<()> {
    print_one(json, !summary.has_failures(), summary, |s| s.render())
}

/// Start-up failure. JSON goes to stdout like every other envelope, text to stderr.
pub fn print_error(json: bool, code: &str, message: &str) {
    if json {
        let body = JsonErr {
            ok: false,
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        };
        match serde_json::to_string_pretty(&body) {
            Ok(s) => println!("{}", s),
            Err(_) => println!("{{\"ok\":false}}"),
        }
    } else {
        eprintln!("error: {}", message);
    }
}
