//! Client for the gym-http-api simulation service.
//!
//! Endpoints live under `/v1/envs/`. Every request is a JSON POST (or GET for the space
//! descriptions) and every response is a JSON object.

use dyna_core::{
    DynaError,
    env::{Env, EnvironmentDescription, Observation, SnapShot, Space},
    error::EnvError,
    report::{ReportSink, RunSummary},
};
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::{path::PathBuf, time::Duration};
use tracing::{debug, info};

fn transport_error(err: reqwest::Error) -> EnvError {
    if err.is_connect() {
        EnvError::unreachable(err.to_string())
    } else if err.is_timeout() {
        EnvError::transient(err.to_string())
    } else {
        EnvError::fatal(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    instance_id: String,
}

#[derive(Debug, Deserialize)]
struct ResetResponse {
    observation: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub struct StepResponse {
    pub observation: Vec<f32>,
    pub reward: f32,
    pub done: bool,
    #[serde(default)]
    pub info: Value,
}

#[derive(Debug, Deserialize)]
struct SpaceResponse {
    info: SpaceInfo,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "name")]
enum SpaceInfo {
    Discrete {
        n: usize,
    },
    Box {
        shape: Vec<usize>,
        #[serde(default)]
        low: Option<Vec<f32>>,
        #[serde(default)]
        high: Option<Vec<f32>>,
    },
}

impl From<SpaceInfo> for Space {
    fn from(value: SpaceInfo) -> Self {
        match value {
            SpaceInfo::Discrete { n } => Space::Discrete(n),
            SpaceInfo::Box { shape, low, high } => Space::Continous {
                min: low,
                max: high,
                size: shape.iter().product(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpGymClient {
    base_url: String,
    http: Client,
}

impl HttpGymClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EnvError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| EnvError::fatal(err.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http,
        })
    }

    fn check(response: Response) -> Result<Response, EnvError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = format!("service answered {status}: {body}");
        if status.is_server_error() {
            Err(EnvError::transient(message))
        } else {
            Err(EnvError::fatal(message))
        }
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, EnvError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .map_err(transport_error)?;
        Self::check(response)?
            .json()
            .map_err(|err| EnvError::Protocol(err.to_string()))
    }

    /// POST whose response carries nothing we need.
    fn post_empty(&self, path: &str, body: &Value) -> Result<(), EnvError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .map_err(transport_error)?;
        Self::check(response).map(|_| ())
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, EnvError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");
        let response = self.http.get(&url).send().map_err(transport_error)?;
        Self::check(response)?
            .json()
            .map_err(|err| EnvError::Protocol(err.to_string()))
    }

    pub fn create(&self, env_id: &str) -> Result<String, EnvError> {
        let response: CreateResponse = self.post("/v1/envs/", &json!({ "env_id": env_id }))?;
        Ok(response.instance_id)
    }

    pub fn reset(&self, instance_id: &str) -> Result<Vec<f32>, EnvError> {
        let response: ResetResponse =
            self.post(&format!("/v1/envs/{instance_id}/reset/"), &json!({}))?;
        Ok(response.observation)
    }

    pub fn step(&self, instance_id: &str, action: usize) -> Result<StepResponse, EnvError> {
        self.post(
            &format!("/v1/envs/{instance_id}/step/"),
            &json!({ "action": action, "render": false }),
        )
    }

    pub fn action_space(&self, instance_id: &str) -> Result<Space, EnvError> {
        let response: SpaceResponse = self.get(&format!("/v1/envs/{instance_id}/action_space/"))?;
        Ok(response.info.into())
    }

    pub fn observation_space(&self, instance_id: &str) -> Result<Space, EnvError> {
        let response: SpaceResponse =
            self.get(&format!("/v1/envs/{instance_id}/observation_space/"))?;
        Ok(response.info.into())
    }

    pub fn start_monitor(
        &self,
        instance_id: &str,
        settings: &MonitorSettings,
    ) -> Result<(), EnvError> {
        self.post_empty(
            &format!("/v1/envs/{instance_id}/monitor/start/"),
            &json!({
                "directory": settings.directory,
                "force": settings.force,
                "resume": settings.resume,
                "video_callable": settings.video,
            }),
        )
    }

    pub fn close_monitor(&self, instance_id: &str) -> Result<(), EnvError> {
        self.post_empty(&format!("/v1/envs/{instance_id}/monitor/close/"), &json!({}))
    }

    pub fn close(&self, instance_id: &str) -> Result<(), EnvError> {
        self.post_empty(&format!("/v1/envs/{instance_id}/close/"), &json!({}))
    }

    pub fn upload(
        &self,
        training_dir: &str,
        api_key: Option<&str>,
        algorithm_id: Option<&str>,
    ) -> Result<(), EnvError> {
        self.post_empty(
            "/v1/upload/",
            &json!({
                "training_dir": training_dir,
                "api_key": api_key.unwrap_or_default(),
                "algorithm_id": algorithm_id.unwrap_or_default(),
            }),
        )
    }
}

/// Recording monitor options, passed straight through to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    pub directory: String,
    pub force: bool,
    pub resume: bool,
    pub video: bool,
}

impl MonitorSettings {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            force: true,
            resume: false,
            video: false,
        }
    }
}

/// One environment instance hosted by the service.
pub struct HttpGymEnv {
    client: HttpGymClient,
    instance_id: String,
    description: EnvironmentDescription,
    monitor: Option<MonitorSettings>,
    closed: bool,
}

impl HttpGymEnv {
    pub fn create(
        client: HttpGymClient,
        env_id: &str,
        monitor: Option<MonitorSettings>,
    ) -> Result<Self, EnvError> {
        let instance_id = client.create(env_id)?;
        let action_space = client.action_space(&instance_id)?;
        let observation_space = client.observation_space(&instance_id)?;
        info!(env_id, %instance_id, "created remote environment");
        Ok(Self {
            client,
            instance_id,
            description: EnvironmentDescription::new(observation_space, action_space),
            monitor,
            closed: false,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn client(&self) -> &HttpGymClient {
        &self.client
    }
}

impl Env for HttpGymEnv {
    // the service seeds its own environments
    fn reset(&mut self, _seed: u64) -> Result<Observation, EnvError> {
        Ok(Observation::new(self.client.reset(&self.instance_id)?))
    }

    fn step(&mut self, action: usize) -> Result<SnapShot, EnvError> {
        let size = self.description.action_size();
        if action >= size {
            return Err(EnvError::InvalidAction { action, size });
        }
        let response = self.client.step(&self.instance_id, action)?;
        Ok(SnapShot {
            state: Observation::new(response.observation),
            reward: response.reward,
            terminated: response.done,
            truncated: false,
        })
    }

    fn env_description(&self) -> EnvironmentDescription {
        self.description.clone()
    }

    fn start_session(&mut self) -> Result<(), EnvError> {
        if let Some(monitor) = &self.monitor {
            info!(directory = %monitor.directory, "starting monitor");
            self.client.start_monitor(&self.instance_id, monitor)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), EnvError> {
        if self.closed {
            return Ok(());
        }
        if self.monitor.is_some() {
            self.client.close_monitor(&self.instance_id)?;
        }
        self.client.close(&self.instance_id)?;
        self.closed = true;
        Ok(())
    }
}

/// Uploads the monitor directory of a finished run to the scoreboard.
pub struct GymUploadSink {
    client: HttpGymClient,
    training_dir: PathBuf,
    api_key: Option<String>,
    algorithm_id: Option<String>,
}

impl GymUploadSink {
    /// The API key is read from `OPENAI_GYM_API_KEY` when not given.
    pub fn new(client: HttpGymClient, training_dir: impl Into<PathBuf>, api_key: Option<String>) -> Self {
        let api_key = api_key.or_else(|| std::env::var("OPENAI_GYM_API_KEY").ok());
        Self {
            client,
            training_dir: training_dir.into(),
            api_key,
            algorithm_id: None,
        }
    }

    pub fn with_algorithm_id(mut self, algorithm_id: impl Into<String>) -> Self {
        self.algorithm_id = Some(algorithm_id.into());
        self
    }
}

impl ReportSink for GymUploadSink {
    fn report(&mut self, summary: &RunSummary) -> dyna_core::Result<()> {
        let training_dir = self.training_dir.to_string_lossy();
        info!(
            %training_dir,
            episodes = summary.episodes,
            "uploading monitor results"
        );
        self.client
            .upload(
                &training_dir,
                self.api_key.as_deref(),
                self.algorithm_id.as_deref(),
            )
            .map_err(DynaError::from)
    }
}
