use crate::*;

pub fn run<C: Clock>(s: &Scenario<'_, C>) {
    let Some(reg) = s.settings.registry.as_ref() else {
        s.runner.skip(
            "registry",
            &format!(
                "{}, {} or {} not set",
                REGISTRY_URL_ENV, REGISTRY_USER_ENV, REGISTRY_TOKEN_ENV
            ),
        );
        return;
    };
    let add = || {
        s.inv(
            &["registry", "add", &reg.url, &reg.user, &reg.token],
            ResponseShape::Array,
        )
        .masking(&reg.token)
    };
    let exists = |note: &str| {
        ExpectedFailure::new(STATE_NOT_OK, note).message_contains(REGISTRY_ALREADY_EXISTS)
    };

    // a leftover registry from an earlier run only means the first add finds it
    s.runner.run(
        Check::positive("registry_add", add())
            .subject(format!("added registry {}", reg.url))
            .tolerate(
                ExpectedFailure::new(STATE_OK, &format!("registry {} already present", reg.url))
                    .message_contains(REGISTRY_ALREADY_EXISTS),
            ),
    );
    s.runner.run(
        Check::negative("registry_add", add())
            .subject(format!("registry {} added twice", reg.url))
            .tolerate(exists(&format!("registry {} already exists", reg.url))),
    );

    s.runner.run(
        Check::positive("registry_list", s.inv(&["registry", "list"], ResponseShape::Array))
            .subject("list registries"),
    );

    let target = s
        .fixtures
        .pick(&s.settings.fixtures.registries)
        .cloned()
        .unwrap_or_else(|| reg.url.clone());
    s.runner.run(
        Check::positive("registry_get", s.inv(&["registry", "get", &target], ResponseShape::Array))
            .subject(format!("got registry {}", target))
            .expect(Extract::NonEmpty, STATE_OK),
    );

    s.runner.run(
        Check::positive("registry_del", s.inv(&["registry", "del", &reg.url], ResponseShape::Scalar))
            .subject(format!("registry {} deleted", reg.url))
            .expect(Extract::field(""), true),
    );
}
