//! US vehicle collaborator
//!
//! Thin request/response wrappers over the US remote-control endpoints.
//! Every call refreshes the session first; start commands are normalized
//! through the seat climate validator.

use std::collections::BTreeMap;
use std::sync::Arc;

use bluelink_core::{
    bare_token, normalize_heated_features, seat_heater_vent_info, HeatedFeatures,
    SeatClimateValidator,
};
use reqwest::header::USER_AGENT;
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, instrument};

use crate::controller::SessionController;
use crate::error::{BluelinkError, Result};

const START_PATH: &str = "ac/v2/rcs/rsc/start";
const EV_START_PATH: &str = "ac/v2/evc/fatc/start";
const STOP_PATH: &str = "ac/v2/rcs/rsc/stop";
const UNLOCK_PATH: &str = "ac/v2/rcs/rdo/on";
const LOCK_PATH: &str = "ac/v2/rcs/rdo/off";
const STATUS_PATH: &str = "ac/v2/rcs/rvs/vehicleStatus";

/// Fixed offset the US backend expects on most calls
const DEFAULT_OFFSET: &str = "-5";
/// Offset used for engine start/stop
const ENGINE_OFFSET: &str = "-4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngineType {
    #[default]
    Ice,
    Ev,
}

/// Registration data for one vehicle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleConfig {
    pub vin: String,
    #[serde(alias = "regId")]
    pub registration_id: String,
    #[serde(default)]
    pub generation: String,
    #[serde(default)]
    pub brand_indicator: String,
    #[serde(default)]
    pub engine_type: EngineType,
    #[serde(default)]
    pub id: String,
}

impl VehicleConfig {
    fn is_gen2_ev(&self) -> bool {
        self.engine_type == EngineType::Ev && self.generation == "2"
    }
}

/// Remote start options; omitted fields take their defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartOptions {
    pub hvac: bool,
    /// Minutes the engine stays on
    pub duration: u32,
    /// Target cabin temperature in degrees Fahrenheit
    pub temperature: f64,
    pub defrost: bool,
    pub heated_features: HeatedFeatures,
    /// User-facing seat name -> seat status code
    pub seat_climate_settings: Option<BTreeMap<String, i64>>,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            hvac: false,
            duration: 10,
            temperature: 70.0,
            defrost: false,
            heated_features: HeatedFeatures::default(),
            seat_climate_settings: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Odometer {
    pub value: f64,
    /// Always 0; the backend reports no unit
    pub unit: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollmentDetails {
    #[serde(default)]
    enrolled_vehicle_details: Vec<EnrolledVehicle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrolledVehicle {
    vehicle_details: EnrolledVehicleDetails,
}

#[derive(Debug, Deserialize)]
struct EnrolledVehicleDetails {
    vin: String,
    odometer: Value,
}

/// A vehicle bound to an authenticated session
pub struct Vehicle {
    config: VehicleConfig,
    controller: Arc<SessionController>,
}

impl Vehicle {
    pub fn new(config: VehicleConfig, controller: Arc<SessionController>) -> Self {
        debug!(registration_id = %config.registration_id, "US vehicle created");
        Self { config, controller }
    }

    pub fn vin(&self) -> &str {
        &self.config.vin
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Start the engine with climate settings
    #[instrument(skip(self, options), fields(vin = %self.config.vin))]
    pub async fn start(&self, options: &StartOptions) -> Result<String> {
        let payload = self.start_payload(options);
        self.send_start(&payload).await
    }

    /// Send a start body already built by [`Vehicle::start_payload`]
    #[instrument(skip(self, payload), fields(vin = %self.config.vin))]
    pub async fn send_start(&self, payload: &Value) -> Result<String> {
        let path = if self.config.engine_type == EngineType::Ev {
            EV_START_PATH
        } else {
            START_PATH
        };
        debug!(%payload, "Starting vehicle");

        let response = self
            .request(Method::POST, path, ENGINE_OFFSET)
            .await?
            .json(payload)
            .send()
            .await?;
        self.expect_ok(response, "Vehicle started!").await
    }

    #[instrument(skip(self), fields(vin = %self.config.vin))]
    pub async fn stop(&self) -> Result<String> {
        let response = self
            .request(Method::POST, STOP_PATH, ENGINE_OFFSET)
            .await?
            .send()
            .await?;
        self.expect_ok(response, "Vehicle stopped").await
    }

    #[instrument(skip(self), fields(vin = %self.config.vin))]
    pub async fn lock(&self) -> Result<String> {
        let response = self.door_command(LOCK_PATH).await?;
        self.expect_ok(response, "Lock successful").await
    }

    #[instrument(skip(self), fields(vin = %self.config.vin))]
    pub async fn unlock(&self) -> Result<String> {
        let response = self.door_command(UNLOCK_PATH).await?;
        self.expect_ok(response, "Unlock successful").await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Raw `vehicleStatus` object; `refresh` asks the backend to poll the car
    #[instrument(skip(self), fields(vin = %self.config.vin))]
    pub async fn status(&self, refresh: bool) -> Result<Value> {
        let response = self
            .request(Method::GET, STATUS_PATH, DEFAULT_OFFSET)
            .await?
            .header("REFRESH", refresh.to_string())
            .send()
            .await?;
        let mut body: Value = self.json(response).await?;
        Ok(body
            .get_mut("vehicleStatus")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    #[instrument(skip(self), fields(vin = %self.config.vin))]
    pub async fn odometer(&self) -> Result<Odometer> {
        let path = format!("ac/v2/enrollment/details/{}", self.controller.username());
        let response = self
            .request(Method::GET, &path, DEFAULT_OFFSET)
            .await?
            .send()
            .await?;
        let details: EnrollmentDetails = self.json(response).await?;

        let odometer = details
            .enrolled_vehicle_details
            .into_iter()
            .find(|item| item.vehicle_details.vin == self.config.vin)
            .map(|item| item.vehicle_details.odometer)
            .ok_or_else(|| {
                BluelinkError::ParseError(format!("vehicle {} not enrolled", self.config.vin))
            })?;
        let value = match &odometer {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| BluelinkError::ParseError(format!("unreadable odometer: {}", odometer)))?;

        Ok(Odometer { value, unit: 0 })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Body of a remote start command
    pub fn start_payload(&self, options: &StartOptions) -> Value {
        let env = self.controller.environment();
        let mapping = SeatClimateValidator::validate(env.brand, env.region);
        let heating = normalize_heated_features(&options.heated_features, &mapping);

        let mut body = json!({
            "Ims": 0,
            "airCtrl": u8::from(options.hvac),
            "airTemp": { "unit": 1, "value": options.temperature.to_string() },
            "defrost": options.defrost,
            "heating1": heating,
            "username": self.controller.username(),
            "vin": self.config.vin,
        });

        if self.config.is_gen2_ev() {
            debug!("gen2 EV: seat climate and duration options not supported");
        } else if let Some(fields) = body.as_object_mut() {
            let seats = options
                .seat_climate_settings
                .as_ref()
                .and_then(|requested| seat_heater_vent_info(requested, &mapping));
            fields.insert("igniOnDuration".to_string(), json!(options.duration));
            fields.insert("seatHeaterVentInfo".to_string(), json!(seats));
        }
        body
    }

    async fn door_command(&self, path: &str) -> Result<Response> {
        let form = [
            ("userName", self.controller.username()),
            ("vin", self.config.vin.as_str()),
        ];
        Ok(self
            .request(Method::POST, path, DEFAULT_OFFSET)
            .await?
            .form(&form)
            .send()
            .await?)
    }

    /// Refresh the session, then build a request with the US default headers
    async fn request(&self, method: Method, path: &str, offset: &str) -> Result<RequestBuilder> {
        self.controller.refresh_access_token().await?;

        let env = self.controller.environment();
        let access_token = self.controller.access_token().unwrap_or_default();
        let url = format!("{}/{}", env.base_url, path.trim_start_matches('/'));

        Ok(self
            .controller
            .http_client()
            .request(method, url)
            .header("access_token", bare_token(&access_token))
            .header("client_id", &env.client_id)
            .header("Host", &env.host)
            .header(USER_AGENT, "okhttp/3.12.0")
            .header("registrationId", &self.config.registration_id)
            .header("gen", &self.config.generation)
            .header("username", self.controller.username())
            .header("vin", &self.config.vin)
            .header("APPCLOUD-VIN", &self.config.vin)
            .header("Language", "0")
            .header("to", "ISS")
            .header("encryptFlag", "false")
            .header("from", "SPA")
            .header("brandIndicator", &self.config.brand_indicator)
            .header("bluelinkservicepin", self.controller.pin().unwrap_or_default())
            .header("offset", offset))
    }

    async fn expect_ok(&self, response: Response, message: &str) -> Result<String> {
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await?;
        if status.is_success() {
            debug!(%body, "{}", message);
            Ok(message.to_string())
        } else {
            error!(status = status.as_u16(), %body, "Vehicle command failed");
            Err(BluelinkError::server_error(status.as_u16(), url, body))
        }
    }

    async fn json<T: serde::de::DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BluelinkError::server_error(status.as_u16(), url, body));
        }
        serde_json::from_str(&body).map_err(|e| BluelinkError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerConfig;
    use crate::environment::StaticStamp;
    use bluelink_core::{Brand, Credentials, Region};
    use pretty_assertions::assert_eq;

    fn vehicle(region: Region, engine_type: EngineType, generation: &str) -> Vehicle {
        let config = ControllerConfig {
            credentials: Credentials::new("driver@example.com", "pw"),
            brand: Brand::Hyundai,
            region,
            language: None,
            pin: Some("1234".to_string()),
        };
        let stamp = Arc::new(StaticStamp::new("s"));
        let controller = SessionController::new(config, stamp).unwrap();
        Vehicle::new(
            VehicleConfig {
                vin: "KMHXX00XXXX000000".to_string(),
                registration_id: "REG1".to_string(),
                generation: generation.to_string(),
                brand_indicator: "H".to_string(),
                engine_type,
                id: String::new(),
            },
            Arc::new(controller),
        )
    }

    #[test]
    fn test_default_start_payload() {
        let payload =
            vehicle(Region::Us, EngineType::Ice, "2").start_payload(&StartOptions::default());
        assert_eq!(
            payload,
            json!({
                "Ims": 0,
                "airCtrl": 0,
                "airTemp": { "unit": 1, "value": "70" },
                "defrost": false,
                "heating1": 0,
                "igniOnDuration": 10,
                "seatHeaterVentInfo": null,
                "username": "driver@example.com",
                "vin": "KMHXX00XXXX000000",
            })
        );
    }

    #[test]
    fn test_seat_settings_use_wire_keys() {
        let options = StartOptions {
            hvac: true,
            temperature: 72.5,
            heated_features: HeatedFeatures::Flag(true),
            seat_climate_settings: Some(BTreeMap::from([
                ("driverSeat".to_string(), 8),
                ("passengerSeat".to_string(), 42),
                ("trunk".to_string(), 6),
            ])),
            ..StartOptions::default()
        };
        let payload = vehicle(Region::Us, EngineType::Ice, "2").start_payload(&options);

        assert_eq!(payload["airCtrl"], json!(1));
        assert_eq!(payload["airTemp"]["value"], json!("72.5"));
        assert_eq!(payload["heating1"], json!(1));
        assert_eq!(payload["seatHeaterVentInfo"], json!({ "drvSeatHeatState": 8 }));
    }

    #[test]
    fn test_gen2_ev_omits_duration_and_seats() {
        let options = StartOptions {
            seat_climate_settings: Some(BTreeMap::from([("driverSeat".to_string(), 8)])),
            ..StartOptions::default()
        };
        let payload = vehicle(Region::Us, EngineType::Ev, "2").start_payload(&options);
        assert!(payload.get("igniOnDuration").is_none());
        assert!(payload.get("seatHeaterVentInfo").is_none());
    }

    #[test]
    fn test_region_without_mapping_drops_seats_and_heat() {
        let options = StartOptions {
            heated_features: HeatedFeatures::Code(3),
            seat_climate_settings: Some(BTreeMap::from([("driverSeat".to_string(), 8)])),
            ..StartOptions::default()
        };
        let payload = vehicle(Region::Eu, EngineType::Ice, "2").start_payload(&options);
        assert_eq!(payload["heating1"], json!(0));
        assert_eq!(payload["seatHeaterVentInfo"], Value::Null);
    }

    #[test]
    fn test_start_options_from_partial_json() {
        let options: StartOptions =
            serde_json::from_str(r#"{"hvac":true,"heatedFeatures":2,"seatClimateSettings":{"driverSeat":6}}"#)
                .unwrap();
        assert!(options.hvac);
        assert_eq!(options.duration, 10);
        assert_eq!(options.heated_features, HeatedFeatures::Code(2));
    }

    #[test]
    fn test_vehicle_config_accepts_reg_id_alias() {
        let config: VehicleConfig =
            serde_json::from_str(r#"{"vin":"V","regId":"R","engineType":"EV","generation":"2"}"#).unwrap();
        assert_eq!(config.registration_id, "R");
        assert!(config.is_gen2_ev());
    }
}
