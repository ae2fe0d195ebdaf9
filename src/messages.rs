// Message types exchanged over zenoh

use serde::{Deserialize, Serialize};

use crate::motor::StopAction;
use crate::sim::{Address, LedColor, Pose, SensorValue};

// Request from a control program -> runtime
// Tagged by "op", e.g. {"op": "reset"}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RobotRequest {
    Motor(MotorRequest),
    Led {
        address: Address,
        color: LedColor,
    },
    Sound {
        address: Address,
        message: String,
        seconds: f64,
    },
    // answered on the reading topic once the next tick has refreshed it
    ReadSensor {
        address: Address,
    },
    Reset,
}

// Motor setters to apply, then an optional run/stop
// Fields left out keep whatever the motor had recorded before
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorRequest {
    pub address: Address,
    pub duty_cycle: Option<i32>,
    pub speed: Option<f64>,
    pub distance: Option<f64>,
    pub time: Option<u64>,
    pub stop_action: Option<StopAction>,
    pub action: Option<MotorAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorAction {
    RunForever,
    RunToRelPos,
    RunTimed,
    RunDirect,
    Stop,
}

/// Pose published by the runtime every tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PoseReport {
    pub x: f64,
    pub y: f64,
    pub angle_degrees: f64,
}

impl From<&Pose> for PoseReport {
    fn from(pose: &Pose) -> Self {
        Self {
            x: pose.position.x,
            y: pose.position.y,
            angle_degrees: pose.angle.to_degrees(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorReading {
    pub address: Address,
    pub value: SensorValue,
}

/// Answer to a `read_sensor` request. `value` is null right after a reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorReply {
    pub address: Address,
    pub value: Option<SensorValue>,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    Stuck,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_motor_request() {
        let json = r#"{
            "op": "motor",
            "address": {"brick": 0, "port": "ev3-ports:outA"},
            "speed": 360,
            "stop_action": "coast",
            "action": "run_forever"
        }"#;
        let req: RobotRequest = serde_json::from_str(json).unwrap();
        match req {
            RobotRequest::Motor(m) => {
                assert_eq!(m.address, Address::new(0, "ev3-ports:outA"));
                assert_eq!(m.speed, Some(360.0));
                assert_eq!(m.distance, None);
                assert_eq!(m.stop_action, Some(StopAction::Coast));
                assert_eq!(m.action, Some(MotorAction::RunForever));
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_parse_reset_and_led() {
        let req: RobotRequest = serde_json::from_str(r#"{"op": "reset"}"#).unwrap();
        assert_eq!(req, RobotRequest::Reset);

        let req: RobotRequest = serde_json::from_str(
            r#"{"op": "led", "address": {"brick": 0, "port": "led0"}, "color": "amber"}"#,
        )
        .unwrap();
        assert_eq!(
            req,
            RobotRequest::Led {
                address: Address::new(0, "led0"),
                color: LedColor::Amber,
            }
        );
    }

    #[test]
    fn test_parse_read_sensor() {
        let req: RobotRequest = serde_json::from_str(
            r#"{"op": "read_sensor", "address": {"brick": 0, "port": "in1"}}"#,
        )
        .unwrap();
        assert_eq!(
            req,
            RobotRequest::ReadSensor {
                address: Address::new(0, "in1"),
            }
        );
    }

    #[test]
    fn test_bad_stop_action_is_rejected() {
        let json = r#"{"op": "motor", "address": {"brick": 0, "port": "outA"}, "stop_action": "spin"}"#;
        assert!(serde_json::from_str::<RobotRequest>(json).is_err());
    }

    #[test]
    fn test_pose_report_in_degrees() {
        let report = PoseReport::from(&Pose::new(1.0, 2.0, std::f64::consts::PI));
        assert!((report.angle_degrees - 180.0).abs() < 1e-9);
    }
}
