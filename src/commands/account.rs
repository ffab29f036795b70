use crate::*;
use serde_json::Value;

pub fn run<C: Clock>(s: &Scenario<'_, C>) {
    let acct = s.fixtures.account();
    let name = acct.account_name.as_str();
    let email = acct.email.as_str();

    s.runner.run(
        Check::positive(
            "account_add",
            s.inv(&["account", "add", "--email", email, name], ResponseShape::Object),
        )
        .subject(format!("account: {}; email: {}", name, email))
        .expect_field("state", "enabled"),
    );
    transition(s, "get", name, "enabled");
    transition(s, "disable", name, "disabled");
    transition(s, "enable", name, "enabled");
    s.runner.run(delete(s, Polarity::Negative, name));
    transition(s, "disable", name, "disabled");
    s.runner.run(delete(s, Polarity::Positive, name));

    list(s);
    list_as_non_admin(s);

    user_list(s);
    user_add(s);
    user_del(s);
    user_get(s);
    user_setpassword(s);
    whoami(s);
}

fn transition<C: Clock>(s: &Scenario<'_, C>, verb: &str, name: &str, state: &str) {
    s.runner.run(
        Check::positive(
            &format!("account_{}", verb),
            s.inv(&["account", verb, name], ResponseShape::Object),
        )
        .subject(format!("account: {}", name))
        .expect_field("state", state),
    );
}

/// Deleting an enabled account is rejected; the rejection means the account is still enabled.
fn delete<C: Clock>(s: &Scenario<'_, C>, polarity: Polarity, name: &str) -> Check {
    Check::new(
        "account_del",
        polarity,
        s.inv(&["account", "del", "--dontask", name], ResponseShape::Object),
    )
    .subject(format!("account: {}", name))
    .expect_field("state", "deleting")
    .tolerate(
        ExpectedFailure::new("enabled", &format!("could not delete account: {}", name))
            .message(ACCOUNT_DELETE_WHILE_ENABLED),
    )
}

fn user_add_invocation(ctx: &ToolContext, acct: &FakeAccount) -> Invocation {
    ctx.invocation(
        [
            "account",
            "user",
            "add",
            "--account",
            acct.account_name.as_str(),
            acct.user.as_str(),
            acct.password.as_str(),
        ],
        ResponseShape::Object,
    )
    .masking(&acct.password)
}

/// Unrecorded setup: a fresh account, optionally with one user.
fn provision<C: Clock>(s: &Scenario<'_, C>, with_user: bool) -> Result<FakeAccount, CallError> {
    let acct = s.fixtures.account();
    s.runner.query(
        "account_add",
        &s.inv(
            &["account", "add", "--email", &acct.email, &acct.account_name],
            ResponseShape::Object,
        ),
    )?;
    if with_user {
        s.runner
            .query("account_user_add", &user_add_invocation(&s.ctx, &acct))?;
    }
    Ok(acct)
}

fn login(acct: &FakeAccount) -> Credentials {
    Credentials {
        user: acct.user.clone(),
        password: acct.password.clone(),
    }
}

fn unauthorized(note: &str) -> ExpectedFailure {
    ExpectedFailure::new(STATE_NOT_OK, note)
        .body(UNAUTHORIZED)
        .httpcode(HTTP_FORBIDDEN)
}

fn list<C: Clock>(s: &Scenario<'_, C>) {
    s.runner.run(
        Check::positive("account_list", s.inv(&["account", "list"], ResponseShape::Array))
            .subject("list accounts as admin"),
    );
}

fn list_as_non_admin<C: Clock>(s: &Scenario<'_, C>) {
    let acct = match provision(s, true) {
        Ok(a) => a,
        Err(e) => {
            s.runner
                .skip("account_list", &format!("setup failed: {}", e));
            return;
        }
    };
    let ctx = s.ctx.as_user(login(&acct));
    s.runner.run(
        Check::negative(
            "account_list",
            ctx.invocation(["account", "list"], ResponseShape::Array),
        )
        .subject(format!("list accounts as {}", acct.user))
        .tolerate(unauthorized("non-admin user could not list accounts")),
    );
}

fn user_list<C: Clock>(s: &Scenario<'_, C>) {
    s.runner.run(
        Check::positive(
            "account_user_list",
            s.inv(&["account", "user", "list"], ResponseShape::Array),
        )
        .subject("users of the admin account")
        .expect(Extract::NonEmpty, STATE_OK),
    );

    match provision(s, false) {
        Ok(acct) => {
            s.runner.run(
                Check::positive(
                    "account_user_list",
                    s.inv(
                        &["account", "user", "list", "--account", &acct.account_name],
                        ResponseShape::Array,
                    ),
                )
                .subject(format!("users of account without users {}", acct.account_name))
                .expect(Extract::Count, 0),
            );
        }
        Err(e) => s
            .runner
            .skip("account_user_list", &format!("setup failed: {}", e)),
    }

    match provision(s, true) {
        Ok(acct) => {
            s.runner.run(
                Check::positive(
                    "account_user_list",
                    s.inv(
                        &["account", "user", "list", "--account", &acct.account_name],
                        ResponseShape::Array,
                    ),
                )
                .subject(format!("users of account {}", acct.account_name))
                .expect(Extract::NonEmpty, STATE_OK),
            );
        }
        Err(e) => s
            .runner
            .skip("account_user_list", &format!("setup failed: {}", e)),
    }

    // a user of one account listing another account's users
    let accounts = provision(s, true).and_then(|a| Ok((a, provision(s, false)?)));
    match accounts {
        Ok((member, other)) => {
            let ctx = s.ctx.as_user(login(&member));
            s.runner.run(
                Check::negative(
                    "account_user_list",
                    ctx.invocation(
                        [
                            "account",
                            "user",
                            "list",
                            "--account",
                            other.account_name.as_str(),
                        ],
                        ResponseShape::Array,
                    ),
                )
                .subject(format!("{} listing users of {}", member.user, other.account_name))
                .tolerate(unauthorized("non-admin user could not list users")),
            );
        }
        Err(e) => s
            .runner
            .skip("account_user_list", &format!("setup failed: {}", e)),
    }
}

fn user_add<C: Clock>(s: &Scenario<'_, C>) {
    let acct = match provision(s, false) {
        Ok(a) => a,
        Err(e) => {
            s.runner
                .skip("account_user_add", &format!("setup failed: {}", e));
            return;
        }
    };
    let created = Extract::custom(|p| {
        let present = |field: &str| {
            p.lookup(&FieldPath::parse(field))
                .map(|v| !v.is_null())
                .unwrap_or(false)
        };
        let state = if present("created_at") && present("username") {
            STATE_OK
        } else {
            STATE_NOT_OK
        };
        Ok(Value::from(state))
    });
    s.runner.run(
        Check::positive("account_user_add", user_add_invocation(&s.ctx, &acct))
            .subject(format!("user: {}; account: {}", acct.user, acct.account_name))
            .expect(created, STATE_OK),
    );
}

/// Runs `account user <verb>` against a freshly provisioned user.
fn user_call<C: Clock>(
    s: &Scenario<'_, C>,
    action: &str,
    build: impl Fn(&FakeAccount) -> Invocation,
    subject: impl Fn(&FakeAccount) -> String,
) {
    match provision(s, true) {
        Ok(acct) => {
            s.runner
                .run(Check::positive(action, build(&acct)).subject(subject(&acct)));
        }
        Err(e) => s.runner.skip(action, &format!("setup failed: {}", e)),
    }
}

fn user_del<C: Clock>(s: &Scenario<'_, C>) {
    user_call(
        s,
        "account_user_del",
        |a| {
            s.inv(
                &["account", "user", "del", "--account", &a.account_name, &a.user],
                ResponseShape::None,
            )
        },
        |a| format!("user {} deleted from account {}", a.user, a.account_name),
    );
}

fn user_get<C: Clock>(s: &Scenario<'_, C>) {
    user_call(
        s,
        "account_user_get",
        |a| {
            s.inv(
                &["account", "user", "get", "--account", &a.account_name, &a.user],
                ResponseShape::Object,
            )
        },
        |a| format!("got user {} from account {}", a.user, a.account_name),
    );
}

fn user_setpassword<C: Clock>(s: &Scenario<'_, C>) {
    let new_password = s.fixtures.unique("pw");
    user_call(
        s,
        "account_user_setpassword",
        |a| {
            s.inv(
                &[
                    "account",
                    "user",
                    "setpassword",
                    "--account",
                    &a.account_name,
                    "--username",
                    &a.user,
                    &new_password,
                ],
                ResponseShape::None,
            )
            .masking(&new_password)
        },
        |a| {
            format!(
                "set password of user {} from account {}",
                a.user, a.account_name
            )
        },
    );
}

fn whoami<C: Clock>(s: &Scenario<'_, C>) {
    s.runner.run(
        Check::positive("account_whoami", s.inv(&["account", "whoami"], ResponseShape::Object))
            .subject("account whoami called successfully"),
    );
}
