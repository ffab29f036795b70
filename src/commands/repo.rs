use crate::*;

pub fn run<C: Clock>(s: &Scenario<'_, C>) {
    let repos = &s.settings.fixtures.repositories;
    for repo in repos {
        s.runner.run(
            Check::positive("repo_add", s.inv(&["repo", "add", repo], ResponseShape::Array))
                .subject(format!("added repo {}", repo)),
        );
    }
    s.runner.run(
        Check::positive("repo_list", s.inv(&["repo", "list"], ResponseShape::Array))
            .subject("list repos"),
    );
    for repo in repos {
        s.runner.run(
            Check::positive("repo_get", s.inv(&["repo", "get", repo], ResponseShape::Array))
                .subject(format!("got repo {}", repo)),
        );
    }

    let Some(repo) = s.fixtures.pick(repos) else {
        s.runner.skip("repo_unwatch", "no repositories configured");
        return;
    };
    watch(s, "unwatch", repo, false);
    watch(s, "watch", repo, true);
    s.runner.run(
        Check::positive("repo_del", s.inv(&["repo", "del", repo], ResponseShape::Scalar))
            .subject(format!("repo {} deleted", repo))
            .expect(Extract::field(""), true),
    );
}

fn watch<C: Clock>(s: &Scenario<'_, C>, verb: &str, repo: &str, active: bool) {
    s.runner.run(
        Check::positive(
            &format!("repo_{}", verb),
            s.inv(&["repo", verb, repo], ResponseShape::Array),
        )
        .subject(format!("repo {} {}ed", repo, verb))
        .expect_field("0.active", active),
    );
}
