// Keyboard teleop for the simulator: WASD drive, R/F speed, Space reset, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::info;

const SPEEDS: [f64; 3] = [180.0, 360.0, 720.0]; // deg/s
const INPUT_TIMEOUT_MS: u64 = 150; // Stop the wheels after this much time with no input
const LEFT_PORT: &str = "ev3-ports:outA";
const RIGHT_PORT: &str = "ev3-ports:outD";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher("ev3sim/cmd/robot").await?;

    info!("Controls: WASD=drive, R/F=speed, Space=reset, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    // Wheel speeds currently commanded (left, right)
    let mut wheels = (0.0, 0.0);
    let mut sent = (0.0, 0.0);
    let mut last_movement_input = Instant::now();

    loop {
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let speed = SPEEDS[speed_idx];

                match code {
                    KeyCode::Char('w') if pressed => {
                        wheels = (speed, speed);
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        wheels = (-speed, -speed);
                        last_movement_input = Instant::now();
                    }
                    // Turn in place
                    KeyCode::Char('a') if pressed => {
                        wheels = (-speed, speed);
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        wheels = (speed, -speed);
                        last_movement_input = Instant::now();
                    }

                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    KeyCode::Char(' ') if pressed => {
                        publisher.put(json!({"op": "reset"}).to_string()).await?;
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            wheels = (0.0, 0.0);
        }

        // Only publish on change: every run enqueues a fresh 45s of motion
        if wheels != sent {
            send_wheel(publisher, LEFT_PORT, wheels.0).await?;
            send_wheel(publisher, RIGHT_PORT, wheels.1).await?;
            sent = wheels;
        }
    }

    send_wheel(publisher, LEFT_PORT, 0.0).await?;
    send_wheel(publisher, RIGHT_PORT, 0.0).await?;
    Ok(())
}

/// Stop the wheel (dropping queued motion), then run it at `speed` if non-zero
async fn send_wheel(
    publisher: &zenoh::pubsub::Publisher<'_>,
    port: &str,
    speed: f64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let address = json!({"brick": 0, "port": port});
    let stop = json!({
        "op": "motor",
        "address": address,
        "stop_action": "hold",
        "action": "stop"
    });
    publisher.put(stop.to_string()).await?;

    if speed != 0.0 {
        let run = json!({
            "op": "motor",
            "address": address,
            "speed": speed,
            "action": "run_forever"
        });
        publisher.put(run.to_string()).await?;
    }
    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
