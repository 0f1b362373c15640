//! Cliente HTTP para el gateway de la flota
//!
//! Cada request lleva el bearer de la sesión y cada respuesta se inspecciona:
//! un 401/403 limpia la credencial del `SessionStore` antes de devolver el error.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use urlencoding::encode;

use crate::clients::FleetGateway;
use crate::config::environment::EnvironmentConfig;
use crate::models::{
    Driver, DriverPatch, Job, JobPatch, LoginRequest, LoginResponse, ProvisionDriverRequest,
    Vehicle, VehiclePatch, VehicleStatus,
};
use crate::state::SessionStore;
use crate::utils::errors::{AppError, AppResult};

/// URLs base de cada servicio (normalmente las tres son el gateway)
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayUrls {
    pub fleet: String,
    pub driver: String,
    pub dispatch: String,
}

impl GatewayUrls {
    pub fn single(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            fleet: base.clone(),
            driver: base.clone(),
            dispatch: base,
        }
    }

    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self {
            fleet: config.fleet_base_url.clone(),
            driver: config.driver_base_url.clone(),
            dispatch: config.dispatch_base_url.clone(),
        }
    }

    fn vehicles(&self, path: &str) -> String {
        format!("{}/vehicles{}", self.fleet, path)
    }

    fn drivers(&self, path: &str) -> String {
        format!("{}/drivers{}", self.driver, path)
    }

    fn jobs(&self, path: &str) -> String {
        format!("{}/jobs{}", self.dispatch, path)
    }

    fn auth(&self, path: &str) -> String {
        format!("{}/auth{}", self.dispatch, path)
    }
}

pub struct HttpGateway {
    client: Client,
    urls: GatewayUrls,
    session: SessionStore,
}

impl HttpGateway {
    pub fn new(urls: GatewayUrls, session: SessionStore, timeout: Option<Duration>) -> AppResult<Self> {
        let mut builder = Client::builder().user_agent("FleetDispatchConsole/1.0");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Config(format!("No se pudo crear el cliente HTTP: {}", e)))?;

        Ok(Self {
            client,
            urls,
            session,
        })
    }

    pub fn from_config(config: &EnvironmentConfig, session: SessionStore) -> AppResult<Self> {
        Self::new(GatewayUrls::from_config(config), session, config.request_timeout())
    }

    pub fn urls(&self) -> &GatewayUrls {
        &self.urls
    }

    /// Enviar un request con el bearer de la sesión e inspeccionar la respuesta
    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        let request = match self.session.bearer().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            log::error!("❌ Error de red hacia el gateway: {}", e);
            AppError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                log::debug!("🔍 No se pudo leer el cuerpo de error de {}: {}", url, e);
                String::new()
            }
        };
        let error = AppError::from_status(status, &body);

        if error.is_authorization_failure() {
            self.session.authorization_failed(status.as_u16()).await;
        }
        log::warn!("⚠️ {} respondió {}: {}", url, status, error);
        Err(error)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = self.send(request).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            log::error!("❌ Respuesta no decodificable: {} - body: {}", e, text);
            AppError::Decode(e.to_string())
        })
    }

    /// Para operaciones cuyo cuerpo de respuesta se ignora
    async fn execute(&self, request: RequestBuilder) -> AppResult<()> {
        self.send(request).await.map(|_| ())
    }
}

#[async_trait]
impl FleetGateway for HttpGateway {
    async fn login(&self, credentials: &LoginRequest) -> AppResult<LoginResponse> {
        log::info!("🔐 Login de '{}'", credentials.username);
        self.fetch_json(self.client.post(self.urls.auth("/login")).json(credentials))
            .await
    }

    async fn provision_driver(&self, request: &ProvisionDriverRequest) -> AppResult<()> {
        self.execute(self.client.post(self.urls.auth("/provision-driver")).json(request))
            .await
    }

    async fn list_vehicles(&self) -> AppResult<Vec<Vehicle>> {
        self.fetch_json(self.client.get(self.urls.vehicles(""))).await
    }

    async fn create_vehicle(&self, vehicle: &VehiclePatch) -> AppResult<Vehicle> {
        self.fetch_json(self.client.post(self.urls.vehicles("")).json(vehicle))
            .await
    }

    async fn update_vehicle(&self, id: &str, patch: &VehiclePatch) -> AppResult<Vehicle> {
        let url = self.urls.vehicles(&format!("/{}", encode(id)));
        self.fetch_json(self.client.put(url).json(patch)).await
    }

    async fn delete_vehicle(&self, id: &str) -> AppResult<()> {
        let url = self.urls.vehicles(&format!("/{}", encode(id)));
        self.execute(self.client.delete(url)).await
    }

    async fn available_vehicle_by_type(&self, vehicle_type: &str) -> AppResult<Vehicle> {
        let url = self
            .urls
            .vehicles(&format!("/available?type={}", encode(vehicle_type)));
        self.fetch_json(self.client.get(url)).await
    }

    async fn vehicle_by_plate(&self, plate: &str) -> AppResult<Vehicle> {
        let url = self.urls.vehicles(&format!("/by-plate/{}", encode(plate)));
        self.fetch_json(self.client.get(url)).await
    }

    async fn update_vehicle_status(&self, id: &str, status: &VehicleStatus) -> AppResult<()> {
        let url = self.urls.vehicles(&format!(
            "/{}/status?status={}",
            encode(id),
            encode(status.as_str())
        ));
        self.execute(self.client.put(url)).await
    }

    async fn assign_driver(&self, vehicle_id: &str, driver_id: &str) -> AppResult<Vehicle> {
        let url = self.urls.vehicles(&format!(
            "/{}/assign-driver/{}",
            encode(vehicle_id),
            encode(driver_id)
        ));
        self.fetch_json(self.client.put(url)).await
    }

    async fn list_drivers(&self) -> AppResult<Vec<Driver>> {
        self.fetch_json(self.client.get(self.urls.drivers(""))).await
    }

    async fn create_driver(&self, driver: &DriverPatch) -> AppResult<Driver> {
        self.fetch_json(self.client.post(self.urls.drivers("")).json(driver))
            .await
    }

    async fn get_driver(&self, id: &str) -> AppResult<Driver> {
        let url = self.urls.drivers(&format!("/{}", encode(id)));
        self.fetch_json(self.client.get(url)).await
    }

    async fn delete_driver(&self, id: &str) -> AppResult<()> {
        let url = self.urls.drivers(&format!("/{}", encode(id)));
        self.execute(self.client.delete(url)).await
    }

    async fn update_availability(&self, id: &str, available: bool) -> AppResult<()> {
        let url = self
            .urls
            .drivers(&format!("/{}/availability?available={}", encode(id), available));
        self.execute(self.client.put(url)).await
    }

    async fn update_location(&self, id: &str, location: &str, destination: &str) -> AppResult<()> {
        let url = self.urls.drivers(&format!(
            "/{}/location?location={}&destination={}",
            encode(id),
            encode(location),
            encode(destination)
        ));
        self.execute(self.client.put(url)).await
    }

    async fn update_driver_details(&self, id: &str, patch: &DriverPatch) -> AppResult<Driver> {
        let url = self.urls.drivers(&format!("/{}", encode(id)));
        self.fetch_json(self.client.put(url).json(patch)).await
    }

    async fn apply_leave(&self, id: &str) -> AppResult<()> {
        let url = self.urls.drivers(&format!("/{}/leave", encode(id)));
        self.execute(self.client.post(url)).await
    }

    async fn raise_emergency(&self, id: &str) -> AppResult<()> {
        let url = self.urls.drivers(&format!("/{}/emergency", encode(id)));
        self.execute(self.client.post(url)).await
    }

    async fn list_jobs(&self) -> AppResult<Vec<Job>> {
        self.fetch_json(self.client.get(self.urls.jobs(""))).await
    }

    async fn create_job(&self, job: &JobPatch) -> AppResult<Job> {
        self.fetch_json(self.client.post(self.urls.jobs("")).json(job))
            .await
    }

    async fn get_job(&self, id: &str) -> AppResult<Job> {
        let url = self.urls.jobs(&format!("/{}", encode(id)));
        self.fetch_json(self.client.get(url)).await
    }

    async fn update_job(&self, id: &str, patch: &JobPatch) -> AppResult<Job> {
        let url = self.urls.jobs(&format!("/{}", encode(id)));
        self.fetch_json(self.client.put(url).json(patch)).await
    }

    async fn delete_job(&self, id: &str) -> AppResult<()> {
        let url = self.urls.jobs(&format!("/{}", encode(id)));
        self.execute(self.client.delete(url)).await
    }

    async fn mark_arrival(&self, id: &str) -> AppResult<()> {
        let url = self.urls.jobs(&format!("/{}/mark-arrival", encode(id)));
        self.execute(self.client.put(url)).await
    }

    async fn mark_stop(&self, id: &str, stop_name: &str) -> AppResult<()> {
        let url = self.urls.jobs(&format!(
            "/{}/mark-stop?stopName={}",
            encode(id),
            encode(stop_name)
        ));
        self.execute(self.client.put(url)).await
    }

    async fn job_emergency(&self, id: &str) -> AppResult<()> {
        let url = self.urls.jobs(&format!("/{}/emergency", encode(id)));
        self.execute(self.client.post(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::state::{SessionContext, SessionEvent};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[test]
    fn test_single_gateway_urls() {
        let urls = GatewayUrls::single("http://localhost:9000/");
        assert_eq!(urls.vehicles(""), "http://localhost:9000/vehicles");
        assert_eq!(urls.drivers("/d1/leave"), "http://localhost:9000/drivers/d1/leave");
        assert_eq!(urls.jobs("/j1/mark-arrival"), "http://localhost:9000/jobs/j1/mark-arrival");
        assert_eq!(urls.auth("/login"), "http://localhost:9000/auth/login");
    }

    #[test]
    fn test_urls_from_config() {
        let mut config = EnvironmentConfig::default();
        config.driver_base_url = "http://drivers:8082".to_string();
        let urls = GatewayUrls::from_config(&config);
        assert_eq!(urls.drivers(""), "http://drivers:8082/drivers");
        assert_eq!(urls.fleet, crate::config::environment::DEFAULT_GATEWAY_URL);
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_network_error() {
        let session = SessionStore::new();
        let gateway = HttpGateway::new(
            GatewayUrls::single("http://127.0.0.1:9"),
            session,
            Some(Duration::from_secs(2)),
        )
        .unwrap();

        let err = gateway.list_jobs().await.unwrap_err();
        assert!(matches!(err, AppError::Network(_)));
    }

    /// Servidor HTTP de una sola respuesta; devuelve el request recibido
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buffer = [0u8; 1024];
            // Leer cabeceras y cuerpo completos antes de responder
            loop {
                let read = socket.read(&mut buffer).await.unwrap();
                request.extend_from_slice(&buffer[..read]);
                let text = String::from_utf8_lossy(&request).to_ascii_lowercase();
                let Some(header_end) = text.find("\r\n\r\n") else {
                    if read == 0 {
                        break;
                    }
                    continue;
                };
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if read == 0 || request.len() >= header_end + 4 + content_length {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).to_string());
        });

        (base_url, rx)
    }

    fn gateway_for(base_url: &str, session: &SessionStore) -> HttpGateway {
        HttpGateway::new(
            GatewayUrls::single(base_url),
            session.clone(),
            Some(Duration::from_secs(5)),
        )
        .unwrap()
    }

    fn admin_session(token: &str) -> SessionContext {
        SessionContext {
            token: token.to_string(),
            username: "admin".to_string(),
            role: Some(UserRole::Admin),
            driver_id: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_requests_carry_session_bearer() {
        let (base_url, request) = serve_once("200 OK", "[]").await;
        let session = SessionStore::new();
        session.begin(admin_session("tok-123")).await;

        let jobs = gateway_for(&base_url, &session).list_jobs().await.unwrap();

        assert!(jobs.is_empty());
        let request = request.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get /jobs "));
        assert!(request.contains("authorization: bearer tok-123"));
    }

    #[tokio::test]
    async fn test_401_clears_session_and_navigates_once() {
        let (base_url, _request) = serve_once("401 Unauthorized", "").await;
        let session = SessionStore::new();
        session.begin(admin_session("revoked")).await;
        let mut events = session.subscribe();

        let err = gateway_for(&base_url, &session).list_vehicles().await.unwrap_err();

        assert_eq!(err, AppError::Unauthorized { status: 401 });
        assert!(!session.is_authenticated().await);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoginRequired { status: 401 }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_conflict_json_message_surfaces_verbatim() {
        let (base_url, _request) = serve_once(
            "409 Conflict",
            r#"{"message":"Vehicle v1 is not available","status":409}"#,
        )
        .await;
        let session = SessionStore::new();

        let err = gateway_for(&base_url, &session)
            .create_job(&JobPatch::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AppError::Rejected {
                status: 409,
                message: "Vehicle v1 is not available".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_conflict_plain_text_surfaces_verbatim() {
        let (base_url, _request) = serve_once("409 Conflict", "No available vehicle found.").await;
        let session = SessionStore::new();

        let err = gateway_for(&base_url, &session)
            .available_vehicle_by_type("Van")
            .await
            .unwrap_err();

        assert_eq!(err.alert(), "No available vehicle found.");
    }

    #[tokio::test]
    async fn test_404_maps_to_not_found() {
        let (base_url, _request) = serve_once("404 Not Found", "Driver not found: d9").await;
        let session = SessionStore::new();
        session.begin(admin_session("tok")).await;

        let err = gateway_for(&base_url, &session).get_driver("d9").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.alert(), "Driver not found: d9");
        // Un 404 no toca la sesión
        assert!(session.is_authenticated().await);
    }
}
