use async_trait::async_trait;
use colorlab::bridge::{Rgb, SimMessage, Simulation};
use colorlab::config::TimingConfig;
use colorlab::devices::{
    CleaningStationDevice, ColorAnalyzerDevice, ColorMixerDevice, Container, DeviceError, LabDevice, RobotArmDevice,
};
use colorlab::driver::{Driver, DriverError};
use colorlab::drivers::color_mixer::Pigment;
use colorlab::drivers::{CleaningStationDriver, ColorAnalyzerDriver, ColorMixerDriver, MixRecipe};
use colorlab::server::{CommandServer, ServerHandle};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

/// Robot arm driver that remembers every move.
#[derive(Default)]
struct RecordingArm {
    moves: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Driver for RecordingArm {
    fn kind(&self) -> &'static str {
        "robot_arm"
    }

    fn operations(&self) -> &'static [&'static str] {
        &["move", "empty"]
    }

    async fn invoke(&self, operation: &str, params: Map<String, Value>) -> Result<Value, DriverError> {
        if operation == "move" {
            let from = params["from_location"].as_str().unwrap_or_default().to_string();
            let to = params["to_location"].as_str().unwrap_or_default().to_string();
            self.moves.lock().unwrap().push((from, to));
        }
        Ok(json!(true))
    }
}

struct FixedColor(Rgb);

#[async_trait]
impl Simulation for FixedColor {
    fn enqueue(&self, _message: SimMessage) {}

    async fn compute_average_color(&self) -> Option<Rgb> {
        Some(self.0)
    }
}

async fn serve(name: &str, driver: Arc<dyn Driver>) -> ServerHandle {
    CommandServer::bind(name, "127.0.0.1:0", driver).await.unwrap().spawn()
}

fn port_params(server: &ServerHandle) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("port".to_string(), json!(server.local_addr().port()));
    params.insert("host".to_string(), json!("127.0.0.1"));
    params
}

#[tokio::test]
async fn test_move_container_fetches_carries_and_parks() {
    let driver = Arc::new(RecordingArm::default());
    let server = serve("robot_arm", driver.clone()).await;

    let mut arm = RobotArmDevice::new();
    arm.initialize(&port_params(&server)).await.unwrap();
    let mut container = Container::new("c1", "storage");

    arm.move_container(&mut container, "mixer").await.unwrap();
    assert_eq!(container.location(), "mixer");
    assert_eq!(arm.arm_location(), "center");
    assert_eq!(arm.report().get("arm_location"), Some(&json!("center")));

    // Already there: nothing moves.
    arm.move_container(&mut container, "mixer").await.unwrap();

    let moves = driver.moves.lock().unwrap().clone();
    let expected: Vec<(String, String)> = [("center", "storage"), ("storage", "mixer"), ("mixer", "center")]
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    assert_eq!(moves, expected);

    arm.cleanup().await;
}

#[tokio::test]
async fn test_move_to_center_skips_parking_move() {
    let driver = Arc::new(RecordingArm::default());
    let server = serve("robot_arm", driver.clone()).await;

    let mut arm = RobotArmDevice::new();
    arm.initialize(&port_params(&server)).await.unwrap();
    let mut container = Container::new("c1", "center");

    arm.move_container(&mut container, "analyzer").await.unwrap();
    let moves = driver.moves.lock().unwrap().len();
    // center -> analyzer, analyzer -> center
    assert_eq!(moves, 2);
}

#[tokio::test]
async fn test_empty_container_resets_contents() {
    let server = serve("robot_arm", Arc::new(RecordingArm::default())).await;
    let mut arm = RobotArmDevice::new();
    arm.initialize(&port_params(&server)).await.unwrap();

    let mut container = Container::new("c1", "mixer");
    container.add_pigment(Pigment::Yellow, 4.0, 30.0);
    arm.empty_container(&mut container, "disposal").await.unwrap();

    assert_eq!(container.location(), "disposal");
    assert_eq!(container.volume(), 0.0);
    assert_eq!(container.pigment(Pigment::Yellow).volume, 0.0);
}

#[tokio::test]
async fn test_cleaning_marks_container_clean() {
    let server = serve("cleaning_station", Arc::new(CleaningStationDriver::new(true))).await;
    let mut station = CleaningStationDevice::new();
    station.initialize(&port_params(&server)).await.unwrap();

    let mut container = Container::new("c1", "cleaning_station");
    container.add_pigment(Pigment::Black, 1.0, 5.0);
    assert!(!container.is_clean());

    station.clean(&mut container, 2.0).await.unwrap();
    assert!(container.is_clean());
    assert!(station.report().is_empty());
}

#[tokio::test]
async fn test_mixer_records_recipe_in_container() {
    let mixer = ColorMixerDriver::new(Arc::new(FixedColor(Rgb::BLACK)), TimingConfig::fast());
    let server = serve("color_mixer_1", Arc::new(mixer)).await;
    let mut device = ColorMixerDevice::new();
    device.initialize(&port_params(&server)).await.unwrap();

    let mut container = Container::new("c1", "mixer");
    let recipe = MixRecipe {
        cyan_volume: 5.0,
        cyan_strength: 40.0,
        magenta_volume: 2.0,
        magenta_strength: 10.0,
        mixing_time: 0.05,
        mixing_speed: 90.0,
        ..MixRecipe::default()
    };
    device.mix(&mut container, &recipe).await.unwrap();
    device.mix(&mut container, &recipe).await.unwrap();

    assert_eq!(container.pigment(Pigment::Cyan).volume, 10.0);
    assert_eq!(container.pigment(Pigment::Cyan).strength, 40.0);
    assert_eq!(container.volume(), 14.0);
    assert_eq!(container.mixing_speed(), Some(90.0));
    assert!(!container.is_clean());
}

#[tokio::test]
async fn test_analyzer_returns_rgb() {
    let analyzer = ColorAnalyzerDriver::new(Arc::new(FixedColor(Rgb::new(10, 200, 30))), TimingConfig::fast());
    let server = serve("color_analyzer_1", Arc::new(analyzer)).await;
    let mut device = ColorAnalyzerDevice::new();
    device.initialize(&port_params(&server)).await.unwrap();

    let container = Container::new("c1", "analyzer");
    assert_eq!(device.analyze(&container).await.unwrap(), Rgb::new(10, 200, 30));
}

#[tokio::test]
async fn test_initialize_validates_parameters() {
    let mut station = CleaningStationDevice::new();
    assert!(matches!(
        station.initialize(&Map::new()).await,
        Err(DeviceError::MissingParameter("port"))
    ));

    let mut params = Map::new();
    params.insert("port".to_string(), json!("not a port"));
    assert!(matches!(
        station.initialize(&params).await,
        Err(DeviceError::InvalidParameter { name: "port", .. })
    ));

    let mut container = Container::new("c1", "x");
    assert!(matches!(
        station.clean(&mut container, 1.0).await,
        Err(DeviceError::NotInitialized)
    ));
}
