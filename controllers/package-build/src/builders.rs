//! Child resource builders.
//!
//! Pure functions from a `PackageBuild` (plus static settings) to the objects
//! that make up its build pipeline. Every call for the same spec yields the
//! same objects, so the reconciler can rebuild them on each pass and compare.

use crate::config::Settings;
use crate::error::ControllerError;
use crds::openshift::{
    BuildConfig, BuildConfigSpec, BuildOutput, BuildSource, BuildSourceType, BuildStrategy,
    BuildStrategyType, BuildTriggerPolicy, BuildTriggerType, ConfigMapBuildSource,
    DockerBuildStrategy, ImageLookupPolicy, ImageStream, ImageStreamSpec, LocalObjectReference,
    ObjectReference, RunPolicy,
};
use crds::{PackageBuild, PackageBuildSpec, SpackEnvironment};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "package-build-controller";
pub const PACKAGE_BUILD_LABEL: &str = "multiarch.builder.io/package-build";

/// Build context directory receiving the environment ConfigMap
pub const ENVIRONMENT_DIR: &str = "environment";
/// Build context directory receiving the build logic ConfigMap
pub const BUILD_LOGIC_DIR: &str = "build-logic";

const MAX_CONFIG_MAP_KEY_LEN: usize = 253;

/// Inline multi-stage recipe. `{base_image}` and `{environment}` are filled in
/// by [`render_dockerfile`].
const DOCKERFILE_TEMPLATE: &str = r#"FROM {base_image} AS builder
COPY environment/{environment} /opt/spack-environment/spack.yaml
COPY build-logic/ /opt/build-logic/
RUN cd /opt/spack-environment \
 && spack env activate . \
 && spack install --fail-fast \
 && spack gc -y
RUN cd /opt/spack-environment \
 && spack env activate --sh -d . >> /etc/profile.d/z10_spack_environment.sh

FROM {base_image}
COPY --from=builder /opt/spack-environment /opt/spack-environment
COPY --from=builder /opt/software /opt/software
COPY --from=builder /etc/profile.d/z10_spack_environment.sh /etc/profile.d/z10_spack_environment.sh
ENTRYPOINT ["/bin/bash", "--rcfile", "/etc/profile", "-l"]
"#;

pub fn config_map_name(package_build: &str) -> String {
    format!("{package_build}-env")
}

pub fn build_config_name(package_build: &str) -> String {
    format!("{package_build}-buildconfig")
}

/// Check that a spec can be turned into build resources.
pub fn validate_spec(spec: &PackageBuildSpec) -> Result<(), ControllerError> {
    if spec.image_stream.trim().is_empty() {
        return Err(ControllerError::InvalidSpec("imageStream must not be empty".to_string()));
    }
    if spec.environment.is_empty() {
        return Err(ControllerError::InvalidSpec(
            "environment must list at least one entry".to_string(),
        ));
    }
    if let Some(env) = spec.environment.iter().find(|env| !is_config_map_key(&env.name)) {
        return Err(ControllerError::InvalidSpec(format!(
            "environment name {:?} is not a valid ConfigMap key",
            env.name
        )));
    }
    Ok(())
}

fn is_config_map_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_CONFIG_MAP_KEY_LEN
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// The one environment that gets materialized.
fn primary_environment(parent: &PackageBuild) -> Result<&SpackEnvironment, ControllerError> {
    parent
        .spec
        .environment
        .first()
        .ok_or_else(|| ControllerError::InvalidSpec("environment must list at least one entry".to_string()))
}

/// Environments beyond the first, which are not materialized.
pub fn ignored_environments(parent: &PackageBuild) -> Vec<&str> {
    parent
        .spec
        .environment
        .iter()
        .skip(1)
        .map(|env| env.name.as_str())
        .collect()
}

fn child_labels(parent: &PackageBuild) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
        (PACKAGE_BUILD_LABEL.to_string(), parent.name_any()),
    ])
}

/// Metadata for a child: parent's namespace, labels and controller owner reference.
fn child_meta(parent: &PackageBuild, name: String) -> Result<ObjectMeta, ControllerError> {
    let namespace = parent
        .namespace()
        .ok_or(ControllerError::MissingObjectKey("metadata.namespace"))?;
    let owner = parent
        .controller_owner_ref(&())
        .ok_or(ControllerError::MissingObjectKey("metadata.uid"))?;

    Ok(ObjectMeta {
        name: Some(name),
        namespace: Some(namespace),
        labels: Some(child_labels(parent)),
        owner_references: Some(vec![owner]),
        ..Default::default()
    })
}

pub fn render_dockerfile(base_image: &str, environment: &str) -> String {
    DOCKERFILE_TEMPLATE
        .replace("{base_image}", base_image)
        .replace("{environment}", environment)
}

/// Immutable ConfigMap holding the first environment's manifest under its name.
pub fn environment_config_map(parent: &PackageBuild) -> Result<ConfigMap, ControllerError> {
    let env = primary_environment(parent)?;
    Ok(ConfigMap {
        metadata: child_meta(parent, config_map_name(&parent.name_any()))?,
        data: Some(BTreeMap::from([(env.name.clone(), env.data.clone())])),
        immutable: Some(true),
        ..Default::default()
    })
}

/// ImageStream receiving the built image, resolvable by bare name in the namespace.
pub fn image_stream(parent: &PackageBuild) -> Result<ImageStream, ControllerError> {
    let name = parent.spec.image_stream.clone();
    let mut stream = ImageStream::new(
        &name,
        ImageStreamSpec {
            lookup_policy: Some(ImageLookupPolicy { local: true }),
        },
    );
    stream.metadata = child_meta(parent, name)?;
    Ok(stream)
}

/// Docker-strategy BuildConfig producing `<imageStream>:latest`.
pub fn build_config(parent: &PackageBuild, settings: &Settings) -> Result<BuildConfig, ControllerError> {
    let env = primary_environment(parent)?;
    let name = build_config_name(&parent.name_any());

    let spec = BuildConfigSpec {
        run_policy: Some(RunPolicy::Parallel),
        triggers: vec![BuildTriggerPolicy {
            trigger_type: BuildTriggerType::ConfigChange,
        }],
        source: BuildSource {
            source_type: BuildSourceType::Dockerfile,
            dockerfile: Some(render_dockerfile(&settings.base_build_image, &env.name)),
            config_maps: vec![
                ConfigMapBuildSource {
                    config_map: LocalObjectReference {
                        name: config_map_name(&parent.name_any()),
                    },
                    destination_dir: Some(ENVIRONMENT_DIR.to_string()),
                },
                ConfigMapBuildSource {
                    config_map: LocalObjectReference {
                        name: settings.build_logic_config_map.clone(),
                    },
                    destination_dir: Some(BUILD_LOGIC_DIR.to_string()),
                },
            ],
        },
        strategy: BuildStrategy {
            strategy_type: BuildStrategyType::Docker,
            docker_strategy: Some(DockerBuildStrategy {
                from: Some(ObjectReference::new("DockerImage", &settings.base_build_image)),
            }),
        },
        output: BuildOutput {
            to: Some(ObjectReference::new(
                "ImageStreamTag",
                format!("{}:latest", parent.spec.image_stream),
            )),
        },
        successful_builds_history_limit: Some(settings.build_history_limit),
        failed_builds_history_limit: Some(settings.build_history_limit),
    };

    let mut build_config = BuildConfig::new(&name, spec);
    build_config.metadata = child_meta(parent, name)?;
    Ok(build_config)
}

/// Everything a `PackageBuild` should own, built in one go.
#[derive(Debug, Clone)]
pub struct DesiredChildren {
    pub config_map: ConfigMap,
    pub image_stream: ImageStream,
    pub build_config: BuildConfig,
}

impl DesiredChildren {
    pub fn for_package_build(parent: &PackageBuild, settings: &Settings) -> Result<Self, ControllerError> {
        validate_spec(&parent.spec)?;
        Ok(Self {
            config_map: environment_config_map(parent)?,
            image_stream: image_stream(parent)?,
            build_config: build_config(parent, settings)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{env, package_build};

    fn pkg1() -> PackageBuild {
        let mut build = package_build("pkg1", "pkg1-img", vec![env("env", "spack:\n  specs: [zlib]")]);
        build.metadata.uid = Some("uid-pkg1".to_string());
        build
    }

    #[test]
    fn test_environment_config_map() {
        let cm = environment_config_map(&pkg1()).unwrap();

        assert_eq!(cm.metadata.name.as_deref(), Some("pkg1-env"));
        assert_eq!(cm.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(cm.immutable, Some(true));
        let data = cm.data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data["env"], "spack:\n  specs: [zlib]");
    }

    #[test]
    fn test_only_first_environment_is_materialized() {
        let mut parent = pkg1();
        parent.spec.environment.push(env("second", "spack: {}"));
        parent.spec.environment.push(env("third", "spack: {}"));

        let cm = environment_config_map(&parent).unwrap();
        assert_eq!(cm.data.unwrap().keys().collect::<Vec<_>>(), vec!["env"]);
        assert_eq!(ignored_environments(&parent), vec!["second", "third"]);
    }

    #[test]
    fn test_children_are_owned_and_labelled() {
        let parent = pkg1();
        let children = DesiredChildren::for_package_build(&parent, &Settings::default()).unwrap();

        for meta in [
            &children.config_map.metadata,
            &children.image_stream.metadata,
            &children.build_config.metadata,
        ] {
            let owners = meta.owner_references.as_ref().unwrap();
            assert_eq!(owners.len(), 1);
            assert_eq!(owners[0].kind, "PackageBuild");
            assert_eq!(owners[0].name, "pkg1");
            assert_eq!(owners[0].uid, "uid-pkg1");
            assert_eq!(owners[0].controller, Some(true));

            let labels = meta.labels.as_ref().unwrap();
            assert_eq!(labels[MANAGED_BY_LABEL], MANAGED_BY);
            assert_eq!(labels[PACKAGE_BUILD_LABEL], "pkg1");
            assert_eq!(meta.namespace.as_deref(), Some("default"));
        }
    }

    #[test]
    fn test_build_config() {
        let settings = Settings {
            build_history_limit: 3,
            ..Default::default()
        };
        let bc = build_config(&pkg1(), &settings).unwrap();

        assert_eq!(bc.metadata.name.as_deref(), Some("pkg1-buildconfig"));
        assert_eq!(bc.spec.run_policy, Some(RunPolicy::Parallel));
        assert_eq!(bc.spec.successful_builds_history_limit, Some(3));
        assert_eq!(bc.spec.failed_builds_history_limit, Some(3));
        assert_eq!(bc.spec.triggers.len(), 1);
        assert_eq!(bc.spec.triggers[0].trigger_type, BuildTriggerType::ConfigChange);

        let inputs: Vec<_> = bc
            .spec
            .source
            .config_maps
            .iter()
            .map(|cm| (cm.config_map.name.as_str(), cm.destination_dir.as_deref()))
            .collect();
        assert_eq!(
            inputs,
            vec![
                ("pkg1-env", Some(ENVIRONMENT_DIR)),
                ("spack-build-logic", Some(BUILD_LOGIC_DIR)),
            ]
        );

        let from = bc.spec.strategy.docker_strategy.unwrap().from.unwrap();
        assert_eq!(from, ObjectReference::new("DockerImage", settings.base_build_image.as_str()));
        assert_eq!(
            bc.spec.output.to,
            Some(ObjectReference::new("ImageStreamTag", "pkg1-img:latest"))
        );
    }

    #[test]
    fn test_build_config_wire_format() {
        let bc = build_config(&pkg1(), &Settings::default()).unwrap();
        let json = serde_json::to_value(&bc).unwrap();

        assert_eq!(json["apiVersion"], "build.openshift.io/v1");
        assert_eq!(json["kind"], "BuildConfig");
        assert_eq!(json["spec"]["runPolicy"], "Parallel");
        assert_eq!(json["spec"]["triggers"][0]["type"], "ConfigChange");
        assert_eq!(json["spec"]["source"]["type"], "Dockerfile");
        assert_eq!(json["spec"]["source"]["configMaps"][0]["configMap"]["name"], "pkg1-env");
        assert_eq!(json["spec"]["strategy"]["type"], "Docker");
        assert_eq!(json["spec"]["strategy"]["dockerStrategy"]["from"]["kind"], "DockerImage");
        assert_eq!(json["spec"]["output"]["to"]["name"], "pkg1-img:latest");
    }

    #[test]
    fn test_dockerfile_references_environment() {
        let dockerfile = render_dockerfile("docker.io/spack/ubuntu-bionic:latest", "env");

        assert!(dockerfile.starts_with("FROM docker.io/spack/ubuntu-bionic:latest AS builder\n"));
        assert!(dockerfile.contains("COPY environment/env /opt/spack-environment/spack.yaml"));
        assert!(!dockerfile.contains('{'));
    }

    #[test]
    fn test_image_stream_uses_local_lookup() {
        let stream = image_stream(&pkg1()).unwrap();
        assert_eq!(stream.metadata.name.as_deref(), Some("pkg1-img"));
        assert_eq!(stream.spec.lookup_policy, Some(ImageLookupPolicy { local: true }));
    }

    #[test]
    fn test_builders_are_deterministic() {
        let settings = Settings::default();
        let first = DesiredChildren::for_package_build(&pkg1(), &settings).unwrap();
        let second = DesiredChildren::for_package_build(&pkg1(), &settings).unwrap();

        assert_eq!(first.config_map, second.config_map);
        assert_eq!(first.build_config, second.build_config);
    }

    #[test]
    fn test_invalid_specs() {
        let cases = [
            package_build("pkg1", "pkg1-img", vec![]),
            package_build("pkg1", "", vec![env("env", "spack: {}")]),
            package_build("pkg1", "pkg1-img", vec![env("my env", "spack: {}")]),
            package_build("pkg1", "pkg1-img", vec![env("..", "spack: {}")]),
        ];
        for case in cases {
            let err = validate_spec(&case.spec).unwrap_err();
            assert!(err.is_unrecoverable(), "{err}");
        }
    }

    #[test]
    fn test_owner_reference_needs_uid() {
        let mut parent = pkg1();
        parent.metadata.uid = None;
        let err = environment_config_map(&parent).unwrap_err();
        assert!(matches!(err, ControllerError::MissingObjectKey("metadata.uid")));
    }
}
