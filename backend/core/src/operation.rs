//! Operation variants and subprocess argv construction.
//!
//! Each operation wraps one external CLI module (`lerobot.calibrate`,
//! `lerobot.teleoperate`, ...). The variants differ only in how the argument
//! list is built and which classifier rule set applies; the broker treats
//! them uniformly.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::BrokerError;

/// Which end of a leader/follower arm pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmSide {
    Leader,
    Follower,
}

/// One arm endpoint: its type tag, serial port, and identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmEndpoint {
    #[serde(rename = "type")]
    pub robot_type: String,
    pub port: String,
    pub id: String,
}

/// Camera attached to a recording or teleoperation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub name: String,
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

fn default_num_episodes() -> u32 {
    5
}

fn default_episode_time_s() -> u32 {
    60
}

fn default_reset_time_s() -> u32 {
    15
}

/// A start request: which command family to run, with its parameter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    Calibration {
        arm: ArmSide,
        robot_type: String,
        port: String,
        robot_id: String,
    },
    Teleoperation {
        leader: ArmEndpoint,
        follower: ArmEndpoint,
        #[serde(default)]
        cameras: Vec<CameraDescriptor>,
    },
    MotorSetup {
        robot_type: String,
        port: String,
    },
    DatasetRecord {
        robot_type: String,
        port: String,
        robot_id: String,
        repo_id: String,
        #[serde(default)]
        single_task: Option<String>,
        #[serde(default = "default_num_episodes")]
        num_episodes: u32,
        #[serde(default = "default_episode_time_s")]
        episode_time_s: u32,
        #[serde(default = "default_reset_time_s")]
        reset_time_s: u32,
        #[serde(default)]
        push_to_hub: bool,
        #[serde(default)]
        cameras: Vec<CameraDescriptor>,
    },
    DatasetReplay {
        robot_type: String,
        port: String,
        robot_id: String,
        repo_id: String,
        #[serde(default)]
        episode: u32,
    },
    ModelTraining {
        repo_id: String,
        policy_type: String,
        output_dir: String,
        job_name: String,
        device: String,
        #[serde(default)]
        wandb: bool,
        #[serde(default)]
        resume: bool,
    },
}

/// Command family tag, used for classifier rule selection and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Calibration,
    Teleoperation,
    MotorSetup,
    DatasetRecord,
    DatasetReplay,
    ModelTraining,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Calibration => "calibration",
            Self::Teleoperation => "teleoperation",
            Self::MotorSetup => "motor_setup",
            Self::DatasetRecord => "dataset_record",
            Self::DatasetReplay => "dataset_replay",
            Self::ModelTraining => "model_training",
        };
        f.write_str(s)
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Calibration { .. } => OperationKind::Calibration,
            Self::Teleoperation { .. } => OperationKind::Teleoperation,
            Self::MotorSetup { .. } => OperationKind::MotorSetup,
            Self::DatasetRecord { .. } => OperationKind::DatasetRecord,
            Self::DatasetReplay { .. } => OperationKind::DatasetReplay,
            Self::ModelTraining { .. } => OperationKind::ModelTraining,
        }
    }

    /// Check that every required parameter is present and non-empty.
    pub fn validate(&self) -> Result<(), BrokerError> {
        let require = |value: &str, name: &str| {
            if value.trim().is_empty() {
                Err(BrokerError::configuration(format!("missing {name}")))
            } else {
                Ok(())
            }
        };
        match self {
            Self::Calibration {
                robot_type,
                port,
                robot_id,
                ..
            } => {
                require(robot_type, "robot_type")?;
                require(port, "port")?;
                require(robot_id, "robot_id")?;
            }
            Self::Teleoperation {
                leader, follower, ..
            } => {
                require(&leader.robot_type, "leader.type")?;
                require(&leader.port, "leader.port")?;
                require(&leader.id, "leader.id")?;
                require(&follower.robot_type, "follower.type")?;
                require(&follower.port, "follower.port")?;
                require(&follower.id, "follower.id")?;
                if leader.port == follower.port {
                    return Err(BrokerError::configuration(
                        "leader and follower cannot share a port",
                    ));
                }
            }
            Self::MotorSetup { robot_type, port } => {
                require(robot_type, "robot_type")?;
                require(port, "port")?;
            }
            Self::DatasetRecord {
                robot_type,
                port,
                robot_id,
                repo_id,
                ..
            } => {
                require(robot_type, "robot_type")?;
                require(port, "port")?;
                require(robot_id, "robot_id")?;
                require(repo_id, "repo_id")?;
            }
            Self::DatasetReplay {
                robot_type,
                port,
                robot_id,
                repo_id,
                ..
            } => {
                require(robot_type, "robot_type")?;
                require(port, "port")?;
                require(robot_id, "robot_id")?;
                require(repo_id, "repo_id")?;
            }
            Self::ModelTraining {
                repo_id,
                policy_type,
                output_dir,
                job_name,
                device,
                ..
            } => {
                require(repo_id, "repo_id")?;
                require(policy_type, "policy_type")?;
                require(output_dir, "output_dir")?;
                require(job_name, "job_name")?;
                require(device, "device")?;
            }
        }
        Ok(())
    }

    /// Physical resources this operation binds. Mutual exclusion is enforced
    /// per entry at start time.
    pub fn ports(&self) -> Vec<String> {
        match self {
            Self::Calibration { port, .. }
            | Self::MotorSetup { port, .. }
            | Self::DatasetRecord { port, .. }
            | Self::DatasetReplay { port, .. } => vec![port.clone()],
            Self::Teleoperation {
                leader, follower, ..
            } => vec![leader.port.clone(), follower.port.clone()],
            // Training contends for its compute device, not a serial port:
            // one training per device at a time.
            Self::ModelTraining { device, .. } => vec![device.clone()],
        }
    }

    /// The wrapped CLI module for this command family.
    pub fn module(&self) -> &'static str {
        match self {
            Self::Calibration { .. } => "lerobot.calibrate",
            Self::Teleoperation { .. } => "lerobot.teleoperate",
            Self::MotorSetup { .. } => "lerobot.setup_motors",
            Self::DatasetRecord { .. } => "lerobot.record",
            Self::DatasetReplay { .. } => "lerobot.replay",
            Self::ModelTraining { .. } => "lerobot.scripts.train",
        }
    }

    /// Build the module-specific flag list.
    pub fn flags(&self) -> Vec<String> {
        match self {
            Self::Calibration {
                arm,
                robot_type,
                port,
                robot_id,
            } => {
                // The calibrate CLI addresses a leader arm through its
                // teleoperator config and a follower arm through its robot
                // config.
                let prefix = match arm {
                    ArmSide::Leader => "teleop",
                    ArmSide::Follower => "robot",
                };
                vec![
                    format!("--{prefix}.type={robot_type}"),
                    format!("--{prefix}.port={port}"),
                    format!("--{prefix}.id={robot_id}"),
                ]
            }
            Self::Teleoperation {
                leader,
                follower,
                cameras,
            } => {
                let mut flags = vec![
                    format!("--teleop.type={}", leader.robot_type),
                    format!("--teleop.port={}", leader.port),
                    format!("--teleop.id={}", leader.id),
                    format!("--robot.type={}", follower.robot_type),
                    format!("--robot.port={}", follower.port),
                    format!("--robot.id={}", follower.id),
                ];
                if let Some(flag) = cameras_flag(cameras) {
                    flags.push(flag);
                }
                flags
            }
            Self::MotorSetup { robot_type, port } => vec![
                format!("--robot.type={robot_type}"),
                format!("--robot.port={port}"),
            ],
            Self::DatasetRecord {
                robot_type,
                port,
                robot_id,
                repo_id,
                single_task,
                num_episodes,
                episode_time_s,
                reset_time_s,
                push_to_hub,
                cameras,
            } => {
                let mut flags = vec![
                    format!("--robot.type={robot_type}"),
                    format!("--robot.port={port}"),
                    format!("--robot.id={robot_id}"),
                    format!("--dataset.repo_id={repo_id}"),
                    format!("--dataset.num_episodes={num_episodes}"),
                    format!("--dataset.episode_time_s={episode_time_s}"),
                    format!("--dataset.reset_time_s={reset_time_s}"),
                    format!("--dataset.push_to_hub={push_to_hub}"),
                ];
                if let Some(task) = single_task {
                    flags.push(format!("--dataset.single_task={task}"));
                }
                if let Some(flag) = cameras_flag(cameras) {
                    flags.push(flag);
                }
                flags
            }
            Self::DatasetReplay {
                robot_type,
                port,
                robot_id,
                repo_id,
                episode,
            } => vec![
                format!("--robot.type={robot_type}"),
                format!("--robot.port={port}"),
                format!("--robot.id={robot_id}"),
                format!("--dataset.repo_id={repo_id}"),
                format!("--dataset.episode={episode}"),
            ],
            Self::ModelTraining {
                repo_id,
                policy_type,
                output_dir,
                job_name,
                device,
                wandb,
                resume,
            } => {
                let mut flags = vec![
                    format!("--dataset.repo_id={repo_id}"),
                    format!("--policy.type={policy_type}"),
                    format!("--output_dir={output_dir}"),
                    format!("--job_name={job_name}"),
                    format!("--policy.device={device}"),
                    format!("--wandb.enable={wandb}"),
                    format!("--resume={resume}"),
                ];
                if *resume {
                    // The train CLI resumes from the last checkpoint under
                    // the job's output directory.
                    flags.push(format!(
                        "--policy.checkpoint_path={output_dir}/checkpoints/last/pretrained_model"
                    ));
                }
                flags
            }
        }
    }

    /// First output line pushed into the session stream on spawn, so the
    /// operator sees an immediate acknowledgement before the CLI warms up.
    pub fn banner(&self) -> String {
        match self {
            Self::Calibration {
                robot_id, port, ..
            } => format!("Calibration started for {robot_id} on port {port}"),
            Self::Teleoperation {
                leader, follower, ..
            } => format!(
                "Teleoperation started for leader {} and follower {}",
                leader.id, follower.id
            ),
            Self::MotorSetup { robot_type, port } => {
                format!("Motor setup started for {robot_type} on port {port}")
            }
            Self::DatasetRecord {
                robot_id, repo_id, ..
            } => format!("Dataset recording started for {robot_id} into {repo_id}"),
            Self::DatasetReplay {
                robot_id, repo_id, ..
            } => format!("Dataset replay started for {robot_id} with dataset {repo_id}"),
            Self::ModelTraining {
                repo_id, job_name, ..
            } => format!("Model training started on {repo_id} as job {job_name}"),
        }
    }
}

/// `--robot.cameras=<json>` flag, mapping camera names to OpenCV configs the
/// wrapped CLI understands.
fn cameras_flag(cameras: &[CameraDescriptor]) -> Option<String> {
    if cameras.is_empty() {
        return None;
    }
    let mut map = serde_json::Map::new();
    for cam in cameras {
        map.insert(
            cam.name.clone(),
            json!({
                "type": "opencv",
                "index_or_path": cam.index,
                "width": cam.width,
                "height": cam.height,
                "fps": cam.fps,
            }),
        );
    }
    Some(format!(
        "--robot.cameras={}",
        serde_json::Value::Object(map)
    ))
}

/// A fully constructed subprocess invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub envs: HashMap<String, String>,
}

/// How wrapped CLI modules are launched. Defaults to `python -m <module>`;
/// overridable so tests and alternative installs can substitute the program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Launcher {
    pub program: String,
    pub base_args: Vec<String>,
    pub envs: HashMap<String, String>,
}

impl Default for Launcher {
    fn default() -> Self {
        // PYTHONUNBUFFERED keeps the child's progress text line-buffered so
        // prompt detection is not delayed by stdio buffering.
        let mut envs = HashMap::new();
        envs.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());
        Self {
            program: "python".to_string(),
            base_args: vec!["-m".to_string()],
            envs,
        }
    }
}

impl Launcher {
    /// Build the argv for an operation: `program base_args... module flags...`.
    pub fn command(&self, operation: &Operation) -> CommandSpec {
        let mut args = self.base_args.clone();
        args.push(operation.module().to_string());
        args.extend(operation.flags());
        CommandSpec {
            program: self.program.clone(),
            args,
            workdir: None,
            envs: self.envs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration() -> Operation {
        Operation::Calibration {
            arm: ArmSide::Follower,
            robot_type: "so100_follower".into(),
            port: "/dev/ttyUSB0".into(),
            robot_id: "arm1".into(),
        }
    }

    #[test]
    fn calibration_argv() {
        let cmd = Launcher::default().command(&calibration());
        assert_eq!(cmd.program, "python");
        assert_eq!(
            cmd.args,
            vec![
                "-m",
                "lerobot.calibrate",
                "--robot.type=so100_follower",
                "--robot.port=/dev/ttyUSB0",
                "--robot.id=arm1",
            ]
        );
    }

    #[test]
    fn leader_calibration_uses_teleop_prefix() {
        let op = Operation::Calibration {
            arm: ArmSide::Leader,
            robot_type: "so100_leader".into(),
            port: "/dev/ttyUSB1".into(),
            robot_id: "arm1".into(),
        };
        let flags = op.flags();
        assert!(flags.iter().all(|f| f.starts_with("--teleop.")));
    }

    #[test]
    fn missing_port_rejected() {
        let op = Operation::MotorSetup {
            robot_type: "so100_follower".into(),
            port: "".into(),
        };
        assert!(matches!(
            op.validate(),
            Err(BrokerError::Configuration(_))
        ));
    }

    #[test]
    fn teleoperation_binds_both_ports() {
        let op = Operation::Teleoperation {
            leader: ArmEndpoint {
                robot_type: "so100_leader".into(),
                port: "/dev/ttyUSB0".into(),
                id: "leader1".into(),
            },
            follower: ArmEndpoint {
                robot_type: "so100_follower".into(),
                port: "/dev/ttyUSB1".into(),
                id: "arm1".into(),
            },
            cameras: vec![],
        };
        assert_eq!(op.ports(), vec!["/dev/ttyUSB0", "/dev/ttyUSB1"]);
    }

    #[test]
    fn record_cameras_flag_is_json() {
        let op = Operation::DatasetRecord {
            robot_type: "so100_follower".into(),
            port: "/dev/ttyUSB0".into(),
            robot_id: "arm1".into(),
            repo_id: "user/demo".into(),
            single_task: Some("pick cube".into()),
            num_episodes: 2,
            episode_time_s: 30,
            reset_time_s: 10,
            push_to_hub: false,
            cameras: vec![CameraDescriptor {
                name: "wrist".into(),
                index: 2,
                width: 640,
                height: 480,
                fps: 30,
            }],
        };
        let flags = op.flags();
        let cameras = flags
            .iter()
            .find(|f| f.starts_with("--robot.cameras="))
            .unwrap();
        let value: serde_json::Value = cameras
            .strip_prefix("--robot.cameras=")
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(value["wrist"]["index_or_path"], 2);
        assert_eq!(value["wrist"]["type"], "opencv");
    }

    #[test]
    fn training_argv_resume_adds_checkpoint_path() {
        let op = Operation::ModelTraining {
            repo_id: "user/demo".into(),
            policy_type: "act".into(),
            output_dir: "outputs/train/act_demo".into(),
            job_name: "act_demo".into(),
            device: "cuda".into(),
            wandb: true,
            resume: true,
        };
        let cmd = Launcher::default().command(&op);
        assert_eq!(cmd.args[0], "-m");
        assert_eq!(cmd.args[1], "lerobot.scripts.train");
        assert!(cmd.args.contains(&"--dataset.repo_id=user/demo".to_string()));
        assert!(cmd.args.contains(&"--policy.type=act".to_string()));
        assert!(cmd.args.contains(&"--policy.device=cuda".to_string()));
        assert!(cmd.args.contains(&"--wandb.enable=true".to_string()));
        assert!(cmd.args.contains(
            &"--policy.checkpoint_path=outputs/train/act_demo/checkpoints/last/pretrained_model"
                .to_string()
        ));

        // Training contends for its device, not a serial port.
        assert_eq!(op.ports(), vec!["cuda"]);
    }

    #[test]
    fn training_without_resume_has_no_checkpoint_flag() {
        let op = Operation::ModelTraining {
            repo_id: "user/demo".into(),
            policy_type: "act".into(),
            output_dir: "outputs/train/act_demo".into(),
            job_name: "act_demo".into(),
            device: "cpu".into(),
            wandb: false,
            resume: false,
        };
        let flags = op.flags();
        assert!(flags.contains(&"--resume=false".to_string()));
        assert!(!flags.iter().any(|f| f.starts_with("--policy.checkpoint_path")));
    }

    #[test]
    fn start_request_json_shape() {
        let json = r#"{
            "operation": "calibration",
            "arm": "follower",
            "robot_type": "so100_follower",
            "port": "/dev/ttyUSB0",
            "robot_id": "arm1"
        }"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert_eq!(op.kind(), OperationKind::Calibration);
        assert_eq!(op.ports(), vec!["/dev/ttyUSB0"]);
    }
}
