//! Estado de sesión del cliente
//!
//! La credencial y la identidad del conductor no viven en un almacenamiento
//! global: se guardan en un `SessionStore` explícito que se inicializa en el
//! login y se limpia en el logout o cuando el gateway responde 401/403.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::models::auth::{LoginResponse, UserRole};
use crate::utils::jwt;

/// Contexto de la sesión activa
#[derive(Clone, Debug, PartialEq)]
pub struct SessionContext {
    pub token: String,
    pub username: String,
    pub role: Option<UserRole>,
    /// Conductor que actúa en el portal (solo sesiones de conductor)
    pub driver_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionContext {
    pub fn from_login(username: &str, response: &LoginResponse) -> Self {
        let claims = jwt::read_claims(&response.token).ok();

        let role = response.role.clone().or_else(|| {
            claims
                .as_ref()
                .and_then(|c| c.role.as_deref())
                .and_then(|role| role.parse::<UserRole>().ok())
        });
        let driver_id = response
            .driver_id
            .clone()
            .or_else(|| claims.as_ref().and_then(|c| c.driver_id.clone()))
            .filter(|id| !id.trim().is_empty());

        Self {
            token: response.token.clone(),
            username: username.to_string(),
            role,
            driver_id,
            expires_at: claims.and_then(|c| c.expires_at()),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Utc::now() >= expires_at)
            .unwrap_or(false)
    }

    pub fn is_driver(&self) -> bool {
        self.role == Some(UserRole::Driver) || self.driver_id.is_some()
    }
}

/// Eventos de sesión que la interfaz consume
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    LoggedOut,
    /// La credencial fue rechazada: hay que volver a la pantalla de login
    LoginRequired { status: u16 },
}

#[derive(Clone)]
pub struct SessionStore {
    current: Arc<RwLock<Option<SessionContext>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            current: Arc::new(RwLock::new(None)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Inicializar la sesión tras un login exitoso
    pub async fn begin(&self, context: SessionContext) {
        let username = context.username.clone();
        log::info!(
            "🔐 Sesión iniciada para '{}' (rol: {:?}, driver: {:?})",
            username,
            context.role,
            context.driver_id
        );
        *self.current.write().await = Some(context);
        let _ = self.events.send(SessionEvent::LoggedIn { username });
    }

    /// Cerrar la sesión por decisión del operador
    pub async fn end(&self) {
        let previous = self.current.write().await.take();
        if let Some(context) = previous {
            log::info!("👋 Sesión cerrada para '{}'", context.username);
            let _ = self.events.send(SessionEvent::LoggedOut);
        }
    }

    /// Sesión actual
    ///
    /// Una sesión expirada se descarta y, como un 401, lleva al login.
    pub async fn current(&self) -> Option<SessionContext> {
        let context = self.current.read().await.clone()?;
        if !context.is_expired() {
            return Some(context);
        }

        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(SessionContext::is_expired) {
            current.take();
            drop(current);
            log::warn!("⌛ Token expirado para '{}'", context.username);
            let _ = self.events.send(SessionEvent::LoginRequired {
                status: StatusCode::UNAUTHORIZED.as_u16(),
            });
            return None;
        }
        current.clone()
    }

    /// Credencial para el header Authorization
    pub async fn bearer(&self) -> Option<String> {
        self.current().await.map(|context| context.token)
    }

    pub async fn acting_driver(&self) -> Option<String> {
        self.current().await.and_then(|context| context.driver_id)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current().await.is_some()
    }

    /// Hook de respuesta para 401/403
    ///
    /// Limpia la credencial y emite una navegación al login. Si ya no había
    /// credencial (la interfaz ya está en el login) no se emite otra.
    pub async fn authorization_failed(&self, status: u16) -> bool {
        let previous = self.current.write().await.take();
        match previous {
            Some(context) => {
                log::warn!(
                    "🚫 Gateway respondió {} - credencial de '{}' eliminada",
                    status,
                    context.username
                );
                let _ = self.events.send(SessionEvent::LoginRequired { status });
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(token: &str) -> SessionContext {
        SessionContext {
            token: token.to_string(),
            username: "alice".to_string(),
            role: Some(UserRole::Driver),
            driver_id: Some("d1".to_string()),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_begin_and_end_session() {
        let store = SessionStore::new();
        let mut events = store.subscribe();

        store.begin(context("t1")).await;
        assert_eq!(store.bearer().await.as_deref(), Some("t1"));
        assert_eq!(store.acting_driver().await.as_deref(), Some("d1"));

        store.end().await;
        assert!(!store.is_authenticated().await);
        assert_eq!(store.acting_driver().await, None);

        assert!(matches!(events.recv().await.unwrap(), SessionEvent::LoggedIn { .. }));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
    }

    #[tokio::test]
    async fn test_authorization_failure_navigates_once() {
        let store = SessionStore::new();
        store.begin(context("t1")).await;
        let mut events = store.subscribe();

        assert!(store.authorization_failed(401).await);
        // Ya en el login: una segunda falla no vuelve a navegar
        assert!(!store.authorization_failed(403).await);

        assert_eq!(store.bearer().await, None);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::LoginRequired { status: 401 }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_expired_session_is_discarded() {
        let store = SessionStore::new();
        let mut expired = context("t1");
        expired.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        store.begin(expired).await;
        let mut events = store.subscribe();

        assert_eq!(store.bearer().await, None);
        // La siguiente consulta ya no encuentra sesión y no vuelve a navegar
        assert!(!store.is_authenticated().await);
        assert!(!store.authorization_failed(401).await);

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::LoginRequired { status: 401 }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_context_from_opaque_login() {
        let response = LoginResponse {
            token: "opaque".to_string(),
            role: Some(UserRole::Admin),
            driver_id: Some("".to_string()),
        };
        let context = SessionContext::from_login("admin", &response);
        assert_eq!(context.driver_id, None);
        assert_eq!(context.expires_at, None);
        assert!(!context.is_driver());
    }
}
