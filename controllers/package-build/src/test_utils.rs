//! Test utilities for unit testing the reconciler
//!
//! Helpers for building PackageBuild fixtures and wiring a reconciler to the
//! in-memory store.

use crate::config::Settings;
use crate::reconciler::Reconciler;
use build_store::{MockStore, StoreError};
use crds::openshift::{
    BUILD_CONFIG_LABEL, BUILD_NUMBER_ANNOTATION, Build, BuildPhase, BuildSpec, BuildStatus,
};
use crds::{InstallStatus, PackageBuild, PackageBuildSpec, PackageBuildStatus, SpackEnvironment};
use std::collections::BTreeMap;

pub const NAMESPACE: &str = "default";

pub fn env(name: &str, data: &str) -> SpackEnvironment {
    SpackEnvironment {
        name: name.to_string(),
        data: data.to_string(),
    }
}

/// PackageBuild in the test namespace, as a user would submit it
pub fn package_build(name: &str, image_stream: &str, environment: Vec<SpackEnvironment>) -> PackageBuild {
    let mut build = PackageBuild::new(
        name,
        PackageBuildSpec {
            image_stream: image_stream.to_string(),
            environment,
        },
    );
    build.metadata.namespace = Some(NAMESPACE.to_string());
    build
}

/// `pkg1` building a zlib environment into `pkg1-img`
pub fn pkg1() -> PackageBuild {
    package_build("pkg1", "pkg1-img", vec![env("env", "spack:\n  specs: [zlib]")])
}

pub fn with_state(mut build: PackageBuild, state: InstallStatus) -> PackageBuild {
    build.status = Some(PackageBuildStatus {
        state,
        ..Default::default()
    });
    build
}

pub fn reconciler_for(store: &MockStore) -> Reconciler {
    Reconciler::new(store.clone(), Settings::default())
}

/// Build number `number` of `build_config`, in `phase`
pub fn build_run(build_config: &str, number: u64, phase: BuildPhase) -> Build {
    let mut build = Build::new(&format!("{build_config}-{number}"), BuildSpec::default());
    build.metadata.namespace = Some(NAMESPACE.to_string());
    build.metadata.labels = Some(BTreeMap::from([(
        BUILD_CONFIG_LABEL.to_string(),
        build_config.to_string(),
    )]));
    build.metadata.annotations = Some(BTreeMap::from([(
        BUILD_NUMBER_ANNOTATION.to_string(),
        number.to_string(),
    )]));
    build.status = Some(BuildStatus {
        phase,
        message: phase.is_failure().then(|| "Docker build strategy has failed.".to_string()),
        ..Default::default()
    });
    build
}

/// A store failure that is neither NotFound, Conflict nor a rejection
pub fn transient_error() -> StoreError {
    let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    StoreError::Serialization(parse_error)
}

pub fn state_of(store: &MockStore, name: &str) -> InstallStatus {
    store.package_build(NAMESPACE, name).unwrap().install_status()
}
