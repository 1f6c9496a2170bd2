use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use shared::frames::DEFAULT_FRAMES_PER_TASK;

use crate::driver::PollingSettings;

/// Settings of the submitting program, read from a TOML file.
///
/// ```toml
/// [storage]
/// base_url = "s3://render-bucket/animations/"
///
/// [cluster]
/// program_path = "target/release/worker"
/// program_arguments = "--config worker.toml"
///
/// [polling]
/// check_interval_seconds = 2.0
/// max_wait_seconds = 3600
///
/// [render]
/// frames_per_task = 10
/// ```
#[derive(Deserialize, Debug)]
pub struct MasterConfiguration {
    pub storage: StorageConfiguration,

    pub cluster: ClusterConfiguration,

    #[serde(default)]
    pub polling: PollingConfiguration,

    #[serde(default)]
    pub render: RenderConfiguration,
}

#[derive(Deserialize, Debug)]
pub struct StorageConfiguration {
    /// Container holding `input/`, `output/` and the scene object.
    pub base_url: String,
}

#[derive(Deserialize, Debug)]
pub struct ClusterConfiguration {
    /// The packaged worker program each job step runs.
    pub program_path: PathBuf,

    /// Extra arguments placed before the storage locations.
    pub program_arguments: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct PollingConfiguration {
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: f64,

    /// Unbounded when missing.
    pub max_wait_seconds: Option<f64>,
}

impl Default for PollingConfiguration {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval_seconds(),
            max_wait_seconds: None,
        }
    }
}

impl PollingConfiguration {
    pub fn to_settings(&self) -> miette::Result<PollingSettings> {
        let check_interval = Duration::try_from_secs_f64(self.check_interval_seconds)
            .map_err(|_| {
                miette::miette!(
                    "Invalid polling check interval: {}",
                    self.check_interval_seconds
                )
            })?;

        let max_wait = self
            .max_wait_seconds
            .map(|seconds| {
                Duration::try_from_secs_f64(seconds)
                    .map_err(|_| miette::miette!("Invalid maximum polling wait: {}", seconds))
            })
            .transpose()?;

        Ok(PollingSettings {
            check_interval,
            max_wait,
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct RenderConfiguration {
    #[serde(default = "default_frames_per_task")]
    pub frames_per_task: usize,
}

impl Default for RenderConfiguration {
    fn default() -> Self {
        Self {
            frames_per_task: default_frames_per_task(),
        }
    }
}

fn default_check_interval_seconds() -> f64 {
    2.0
}

fn default_frames_per_task() -> usize {
    DEFAULT_FRAMES_PER_TASK
}


#[cfg(test)]
mod tests {
    use shared::configuration::parse_from_str;

    use super::*;

    #[test]
    fn minimal_configuration_uses_defaults() {
        let configuration: MasterConfiguration = parse_from_str(
            r#"
            [storage]
            base_url = "memory:///"

            [cluster]
            program_path = "worker"
            "#,
        )
        .unwrap();

        assert_eq!(configuration.render.frames_per_task, 10);
        assert!(configuration.cluster.program_arguments.is_none());

        let settings = configuration.polling.to_settings().unwrap();
        assert_eq!(settings.check_interval, Duration::from_secs(2));
        assert_eq!(settings.max_wait, None);
    }

    #[test]
    fn polling_settings() {
        let configuration: MasterConfiguration = parse_from_str(
            r#"
            [storage]
            base_url = "s3://bucket/renders/"

            [cluster]
            program_path = "/opt/render/worker"
            program_arguments = "--config /opt/render/worker.toml"

            [polling]
            check_interval_seconds = 0.5
            max_wait_seconds = 60

            [render]
            frames_per_task = 4
            "#,
        )
        .unwrap();

        let settings = configuration.polling.to_settings().unwrap();
        assert_eq!(settings.check_interval, Duration::from_millis(500));
        assert_eq!(settings.max_wait, Some(Duration::from_secs(60)));
        assert_eq!(configuration.render.frames_per_task, 4);
    }

    #[test]
    fn negative_interval_is_rejected() {
        let polling = PollingConfiguration {
            check_interval_seconds: -1.0,
            max_wait_seconds: None,
        };
        assert!(polling.to_settings().is_err());
    }

    #[test]
    fn missing_storage_section_is_an_error() {
        let result: miette::Result<MasterConfiguration> =
            parse_from_str("[cluster]\nprogram_path = \"worker\"\n");
        assert!(result.is_err());
    }
}
