//! Scenario catalog: one file per tool command group.
//!
//! ## Files
//! - `account.rs`: account lifecycle, users, whoami.
//! - `image.rs`: image add/wait/get/content/metadata/list/vuln, plus image deletion.
//! - `archive.rs`: analysis-archive images and `evaluate check`.
//! - `repo.rs`: repository watch lifecycle.
//! - `subscription.rs`: subscription list/activate/deactivate.
//! - `system.rs`: status, error codes, feeds, and the service readiness wait.
//! - `registry.rs`: registry add/list/get/del (env-gated).
//!
//! ## Principles
//! - Declare checks here; the runner does invocation, classification and recording.
//! - Setup calls go through `Runner::query` and never produce records.
//! - A missing precondition is a skip, never a failure.

pub mod account;
pub mod archive;
pub mod image;
pub mod registry;
pub mod repo;
pub mod subscription;
pub mod system;

use crate::*;
use clap::ValueEnum;
use tracing::info;

/// Everything a group needs to declare and run its checks.
pub struct Scenario<'a, C: Clock> {
    pub runner: &'a Runner<'a, C>,
    pub ctx: ToolContext,
    pub fixtures: &'a Fixtures,
    pub settings: &'a Settings,
}

impl<C: Clock> Scenario<'_, C> {
    pub fn inv(&self, args: &[&str], shape: ResponseShape) -> Invocation {
        self.ctx.invocation(args.iter().copied(), shape)
    }

    /// Readiness gate: the image has finished analysis.
    pub fn image_gate(&self, image: &str) -> Gate {
        let (timeout, interval) = self.settings.image_wait();
        Gate::new(
            &format!("image {} analyzed", image),
            self.inv(&["image", "get", image], ResponseShape::Array),
            Extract::field("0.analysis_status"),
            "analyzed",
        )
        .every(timeout, interval)
    }

    pub fn test_image(&self) -> Option<String> {
        self.fixtures.pick(&self.settings.fixtures.test_images).cloned()
    }
}

pub fn run_group<C: Clock>(s: &Scenario<'_, C>, group: Group) {
    for g in group.expand() {
        let name = g
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default();
        info!("{} | starting subcommands", name);
        match g {
            Group::All => {}
            Group::Account => account::run(s),
            Group::Image => image::run(s),
            Group::AnalysisArchive => archive::run_analysis_archive(s),
            Group::ImageDeletion => image::run_deletion(s),
            Group::Evaluate => archive::run_evaluate(s),
            Group::Repo => repo::run(s),
            Group::Subscription => subscription::run(s),
            Group::System => system::run(s),
            Group::SystemFeeds => system::run_feeds(s),
            Group::Registry => registry::run(s),
        }
        info!("{} | finished subcommands", name);
    }
}
