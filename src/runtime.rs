// Fixed-rate simulation loop fed by zenoh
// Each tick: forward pending control requests to the worker, advance the
// simulator once, then publish pose, sensor snapshot, health and any answered
// sensor reads.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::{
    LOOP_HZ, REQUEST_QUEUE_CAPACITY, RobotConfig, SimSettings, TOPIC_CMD_ROBOT, TOPIC_HEALTH,
    TOPIC_STATE_POSE, TOPIC_STATE_READING, TOPIC_STATE_SENSORS,
};
use crate::error::SimError;
use crate::messages::{
    MotorAction, MotorRequest, PoseReport, RobotRequest, RuntimeHealth, SensorReading,
    SensorReply,
};
use crate::sim::{ControlHandle, Playfield, RobotSimulator, World};

/// What a control request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Estimated seconds the request keeps its actuator busy.
    Scheduled(f64),
    Reading(SensorReply),
}

/// Apply one control request on the calling thread.
///
/// A sensor read blocks until the simulator's next tick, so this must not be
/// called from the thread that ticks.
pub fn handle_request(
    control: &ControlHandle,
    request: RobotRequest,
) -> Result<RequestOutcome, SimError> {
    debug!("Received request: {:?}", &request);
    let duration = match request {
        RobotRequest::Motor(motor) => on_motor_request(control, motor)?,
        RobotRequest::Led { address, color } => {
            control.set_led_color(&address, color)?;
            0.0
        }
        RobotRequest::Sound {
            address,
            message,
            seconds,
        } => control.play_sound(&address, &message, seconds)?,
        RobotRequest::ReadSensor { address } => {
            let value = control.get_value(&address)?;
            return Ok(RequestOutcome::Reading(SensorReply { address, value }));
        }
        RobotRequest::Reset => {
            info!("Reset requested");
            control.request_reset();
            0.0
        }
    };
    Ok(RequestOutcome::Scheduled(duration))
}

fn on_motor_request(control: &ControlHandle, request: MotorRequest) -> Result<f64, SimError> {
    let mut motor = control.motor(&request.address)?;

    if let Some(duty_cycle) = request.duty_cycle {
        motor.set_duty_cycle(duty_cycle);
    }
    if let Some(speed) = request.speed {
        motor.set_speed(speed);
    }
    if let Some(distance) = request.distance {
        motor.set_distance(distance);
    }
    if let Some(time) = request.time {
        motor.set_time(time);
    }
    if let Some(stop_action) = request.stop_action {
        motor.set_stop_action(stop_action);
    }

    match request.action {
        Some(MotorAction::RunForever) => motor.run_forever(),
        Some(MotorAction::RunToRelPos) => motor.run_to_rel_pos(),
        Some(MotorAction::RunTimed) => motor.run_timed(),
        Some(MotorAction::RunDirect) => motor.run_direct(),
        Some(MotorAction::Stop) => motor.stop(),
        None => Ok(0.0),
    }
}

/// Control side of the runtime: applies requests in arrival order until the
/// request channel closes, sending sensor replies back to the tick loop.
pub fn control_worker(
    control: ControlHandle,
    mut requests: mpsc::Receiver<RobotRequest>,
    replies: mpsc::Sender<SensorReply>,
) {
    while let Some(request) = requests.blocking_recv() {
        match handle_request(&control, request) {
            Ok(RequestOutcome::Scheduled(duration)) => debug!("Request accepted, {:.2}s", duration),
            Ok(RequestOutcome::Reading(reply)) => {
                if replies.blocking_send(reply).is_err() {
                    break;
                }
            }
            Err(e) => warn!("Request rejected: {}", e),
        }
    }
    debug!("Control worker stopped");
}

pub struct Runtime {
    simulator: RobotSimulator,
    control: ControlHandle,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new(simulator: RobotSimulator) -> Self {
        let control = simulator.control();
        Self {
            simulator,
            control,
            health: RuntimeHealth::Ok,
        }
    }

    /// Advance the simulator and track health transitions
    pub fn tick(&mut self) -> Result<(), SimError> {
        self.simulator.update()?;

        let health = if self.simulator.is_stuck() {
            RuntimeHealth::Stuck
        } else {
            RuntimeHealth::Ok
        };
        if health != self.health {
            info!("Health changed: {:?} -> {:?}", self.health, health);
        }
        self.health = health;
        Ok(())
    }

    pub fn pose_report(&self) -> PoseReport {
        PoseReport::from(&self.simulator.robot().pose())
    }

    pub fn sensor_report(&self) -> Vec<SensorReading> {
        self.control
            .sensor_snapshot()
            .into_iter()
            .map(|(address, value)| SensorReading { address, value })
            .collect()
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn control(&self) -> &ControlHandle {
        &self.control
    }
}

pub async fn run(
    robot: RobotConfig,
    settings: SimSettings,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let world: Box<dyn World> =
        Box::new(Playfield::new(settings.field_width, settings.field_height));
    let simulator = RobotSimulator::new(&robot, &settings, world)?;
    let mut runtime = Runtime::new(simulator);

    // requests run on a blocking worker so sensor reads can wait for ticks
    let (request_tx, request_rx) = mpsc::channel::<RobotRequest>(REQUEST_QUEUE_CAPACITY);
    let (reply_tx, mut reply_rx) = mpsc::channel::<SensorReply>(REQUEST_QUEUE_CAPACITY);
    let control = runtime.control().clone();
    tokio::task::spawn_blocking(move || control_worker(control, request_rx, reply_tx));

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_ROBOT).await?;
    let pub_pose = session.declare_publisher(TOPIC_STATE_POSE).await?;
    let pub_sensors = session.declare_publisher(TOPIC_STATE_SENSORS).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;
    let pub_reading = session.declare_publisher(TOPIC_STATE_READING).await?;

    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Simulator started: {}Hz loop, {} frames per simulated second",
        LOOP_HZ, settings.frames_per_second
    );
    info!("Subscribed to: {}", TOPIC_CMD_ROBOT);
    info!(
        "Publishing to: {}, {}, {}, {}",
        TOPIC_STATE_POSE, TOPIC_STATE_SENSORS, TOPIC_HEALTH, TOPIC_STATE_READING
    );

    loop {
        tick.tick().await;

        // 1. Hand all pending requests to the worker (non-blocking)
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<RobotRequest>(&payload) {
                Ok(request) => match request_tx.try_send(request) {
                    Ok(()) => {}
                    Err(TrySendError::Full(request)) => {
                        warn!("Control worker busy, dropping request: {:?}", request);
                    }
                    Err(TrySendError::Closed(_)) => return Err("control worker stopped".into()),
                },
                Err(e) => {
                    warn!("Failed to parse request: {}", e);
                }
            }
        }

        // 2. Advance the simulation by one tick
        runtime.tick()?;

        // 3. Publish pose and sensors
        let pose_json = serde_json::to_string(&runtime.pose_report())?;
        pub_pose.put(pose_json).await?;
        let sensors_json = serde_json::to_string(&runtime.sensor_report())?;
        pub_sensors.put(sensors_json).await?;

        // 4. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;

        // 5. Publish answered sensor reads
        while let Ok(reply) = reply_rx.try_recv() {
            let reply_json = serde_json::to_string(&reply)?;
            pub_reading.put(reply_json).await?;
        }
    }
}
