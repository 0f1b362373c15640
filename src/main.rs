use anyhow::Result;
use colored::*;
use dotenvy::dotenv;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use fleet_dispatch::clients::{FleetGateway, HttpGateway, InMemoryGateway};
use fleet_dispatch::config::environment::{EnvironmentConfig, GatewayMode};
use fleet_dispatch::models::{Job, LoginRequest, Vehicle};
use fleet_dispatch::services::{
    Confirmation, CredentialSync, DispatchCoordinator, DriverForm, DriverPortal, FleetAdmin,
    HealthService, PollerHandle, PortalState, VehicleForm,
};
use fleet_dispatch::state::{SessionContext, SessionEvent, SessionStore};
use fleet_dispatch::utils::errors::AppError;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();
    let config = EnvironmentConfig::from_env()?;

    // Configurar logging (también recibe los registros de `log` de la librería)
    let level = config
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    info!("🚚 Fleet Dispatch Console");
    info!("========================");
    info!("🌍 Entorno: {} - backend: {:?}", config.environment, config.gateway_mode);

    let session = SessionStore::new();
    let gateway: Arc<dyn FleetGateway> = match config.gateway_mode {
        GatewayMode::Http => {
            info!("🔗 Gateway: {}", config.fleet_base_url);
            Arc::new(HttpGateway::from_config(&config, session.clone())?)
        }
        GatewayMode::Memory => {
            warn!("🧪 Backend en memoria: los datos se pierden al salir (login: admin / admin123)");
            Arc::new(InMemoryGateway::with_demo_fleet(session.clone()).await)
        }
    };
    let coordinator = Arc::new(DispatchCoordinator::new(gateway.clone()));

    spawn_session_watcher(&session);
    tokio::spawn(async {
        if signal::ctrl_c().await.is_ok() {
            info!("🛑 Señal de interrupción recibida, cerrando consola...");
            std::process::exit(0);
        }
    });

    loop {
        if !login(gateway.as_ref(), &session).await? {
            println!("{}", "👋 ¡Hasta luego!".bright_green());
            return Ok(());
        }

        match session.current().await {
            Some(context) if context.is_driver() => {
                driver_console(&coordinator, &session, &config).await?
            }
            Some(_) => admin_console(&coordinator, &gateway, &session, &config).await?,
            None => continue,
        }
    }
}

/// Avisar en pantalla cuando el gateway invalida la credencial
fn spawn_session_watcher(session: &SessionStore) {
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::LoginRequired { status } = event {
                println!();
                println!(
                    "{}",
                    format!("🔒 Sesión inválida (HTTP {}). Vuelve a iniciar sesión.", status)
                        .bright_red()
                        .bold()
                );
            }
        }
    });
}

// ==================== LOGIN ====================

/// Devuelve `false` si el operador eligió salir
async fn login(gateway: &dyn FleetGateway, session: &SessionStore) -> Result<bool> {
    loop {
        println!();
        println!("{}", "🔐 LOGIN".bright_cyan().bold());
        println!("{}", "========".bright_cyan());
        let username = prompt("Username (vacío para salir): ")?;
        if username.is_empty() {
            return Ok(false);
        }
        let password = prompt("Password: ")?;

        let request = LoginRequest { username, password };
        match gateway.login(&request).await {
            Ok(response) => {
                session
                    .begin(SessionContext::from_login(&request.username, &response))
                    .await;
                println!("{}", "✅ Login exitoso".bright_green());
                return Ok(true);
            }
            Err(e) => print_error("Login failed", &e),
        }
    }
}

// ==================== ADMIN ====================

async fn admin_console(
    coordinator: &Arc<DispatchCoordinator>,
    gateway: &Arc<dyn FleetGateway>,
    session: &SessionStore,
    config: &EnvironmentConfig,
) -> Result<()> {
    let admin = FleetAdmin::new(coordinator.clone());
    let health = HealthService::new(gateway.clone());
    let poller = PollerHandle::for_dispatch(coordinator.clone(), config);
    coordinator.refresh().await;

    loop {
        if !session.is_authenticated().await {
            break;
        }

        println!();
        println!("{}", "📋 PANEL DE DESPACHO".bright_green().bold());
        println!("{}", "====================".bright_green());
        println!(" 1. 📊 Dashboard");
        println!(" 2. 🚚 Despachar job");
        println!(" 3. ❌ Cancelar job");
        println!(" 4. 🗑️  Eliminar job");
        println!(" 5. 🆘 Marcar job con emergencia");
        println!(" 6. 🚛 Vehículos");
        println!(" 7. ➕ Registrar / editar vehículo");
        println!(" 8. 🔗 Asignar conductor a vehículo");
        println!(" 9. 🗑️  Dar de baja vehículo");
        println!("10. 👥 Conductores");
        println!("11. ➕ Registrar conductor");
        println!("12. ✏️  Editar conductor");
        println!("13. 🗑️  Terminar contrato");
        println!("14. 🌴 Marcar licencia");
        println!("15. 🚨 Emergencia de conductor");
        println!("16. 📍 Ubicación de conductor");
        println!("17. 🩺 Health check");
        println!("18. 🔄 Refrescar");
        println!(" 0. 🚪 Logout");
        let choice = prompt("Selecciona una opción: ")?;

        match choice.as_str() {
            "1" => show_dashboard(coordinator).await,
            "2" => dispatch_job(coordinator).await?,
            "3" => {
                if let Some(job) = pick_job(coordinator).await? {
                    report_confirmed(coordinator.cancel_job(&job.id, &StdinConfirmation).await, "Cancel failed");
                }
            }
            "4" => {
                if let Some(job) = pick_job(coordinator).await? {
                    report_confirmed(coordinator.delete_job(&job.id, &StdinConfirmation).await, "Delete failed");
                }
            }
            "5" => {
                if let Some(job) = pick_job(coordinator).await? {
                    report(coordinator.flag_job_emergency(&job.id).await, "Emergency failed");
                }
            }
            "6" => show_vehicles(coordinator).await,
            "7" => save_vehicle(coordinator, &admin).await?,
            "8" => {
                if let Some(vehicle) = pick_vehicle(coordinator).await? {
                    let driver_id = prompt("Driver ID: ")?;
                    report(coordinator.assign_driver(&vehicle.id, &driver_id).await, "Assign failed");
                }
            }
            "9" => {
                if let Some(vehicle) = pick_vehicle(coordinator).await? {
                    report_confirmed(admin.delete_vehicle(&vehicle.id, &StdinConfirmation).await, "Delete failed");
                }
            }
            "10" => show_drivers(coordinator).await,
            "11" => {
                let form = read_driver_form(true)?;
                match admin.register_driver(&form).await {
                    Ok(registration) => print_credentials(&registration.credentials),
                    Err(e) => print_error("Error registering driver", &e),
                }
            }
            "12" => {
                let id = prompt("Driver ID: ")?;
                let form = read_driver_form(false)?;
                match admin.update_driver(&id, &form).await {
                    Ok(registration) => print_credentials(&registration.credentials),
                    Err(e) => print_error("Error updating driver", &e),
                }
            }
            "13" => {
                let id = prompt("Driver ID: ")?;
                report_confirmed(admin.delete_driver(&id, &StdinConfirmation).await, "Delete failed");
            }
            "14" => {
                let id = prompt("Driver ID: ")?;
                report_confirmed(admin.mark_on_leave(&id, &StdinConfirmation).await, "Leave failed");
            }
            "15" => {
                let id = prompt("Driver ID: ")?;
                report_confirmed(admin.raise_emergency(&id, &StdinConfirmation).await, "Emergency failed");
            }
            "16" => {
                let id = prompt("Driver ID: ")?;
                let location = prompt("Location: ")?;
                let destination = prompt("Destination: ")?;
                report(
                    admin.set_driver_location(&id, &location, &destination).await,
                    "Location update failed",
                );
            }
            "17" => {
                let probe = health.probe().await;
                for (name, status) in probe.services() {
                    let line = format!("{:<18} {}", name, status);
                    if status.is_online() {
                        println!("{}", line.bright_green());
                    } else {
                        println!("{}", line.bright_red());
                    }
                }
            }
            "18" => {
                let refreshed = coordinator.refresh().await;
                for (name, e) in refreshed.failures() {
                    print_error(&format!("Refresh {} failed", name), e);
                }
            }
            "0" => {
                session.end().await;
                break;
            }
            _ => println!("{}", "❌ Opción inválida. Intenta de nuevo.".bright_red()),
        }
    }

    poller.shutdown().await;
    Ok(())
}

async fn show_dashboard(coordinator: &DispatchCoordinator) {
    let summary = coordinator.fleet_summary().await;
    println!();
    println!("{}", "📊 DASHBOARD".bright_blue().bold());
    println!("Vehículos: {} total", summary.total_vehicles);
    println!("  {} {}", "Available:".bright_green(), summary.available);
    println!("  {} {}", "In transit:".bright_yellow(), summary.in_transit);
    println!("  {} {}", "Maintenance:".bright_red(), summary.maintenance);
    println!("Jobs activos: {}  completados: {}", summary.active_jobs, summary.completed_jobs);
    for (name, e) in coordinator.stale_collections().await {
        println!("{}", format!("⚠️ {} desactualizado: {}", name, e.alert()).bright_yellow());
    }
    println!();
    for job in coordinator.jobs().await.iter().take(10) {
        print_job(job);
    }
}

async fn dispatch_job(coordinator: &DispatchCoordinator) -> Result<()> {
    let candidates = coordinator.dispatch_candidates().await;
    if candidates.is_empty() {
        println!("{}", "⚠️ No hay vehículos AVAILABLE".bright_yellow());
        return Ok(());
    }

    for (index, candidate) in candidates.iter().enumerate() {
        let driver = candidate
            .driver
            .as_ref()
            .map(|d| d.name.as_str())
            .unwrap_or("sin conductor");
        println!(
            "{}. {} ({}) - {}",
            index + 1,
            candidate.vehicle.plate,
            candidate.vehicle.vehicle_type,
            driver
        );
    }
    let Some(index) = choose(candidates.len())? else {
        return Ok(());
    };
    let pickup = prompt("Pickup: ")?;
    let destination = prompt("Destination: ")?;

    match coordinator
        .create_job(&pickup, &destination, &candidates[index].vehicle.id)
        .await
    {
        Ok(job) => println!("{}", format!("✅ Job {} despachado", job.short_id()).bright_green()),
        Err(e) => print_error("Dispatch Failed", &e),
    }
    Ok(())
}

async fn save_vehicle(coordinator: &DispatchCoordinator, admin: &FleetAdmin) -> Result<()> {
    let id = prompt("Vehicle ID a editar (vacío = nuevo): ")?;
    let existing = if id.is_empty() {
        None
    } else {
        match coordinator.vehicles().await.into_iter().find(|v| v.id == id) {
            Some(vehicle) => Some(vehicle),
            None => {
                print_error("Save failed", &AppError::UnknownVehicle(id));
                return Ok(());
            }
        }
    };

    let form = VehicleForm {
        plate: prompt("Plate: ")?,
        vehicle_type: prompt("Type: ")?,
        last_location: prompt("Location: ")?,
        assigned_driver_id: Some(prompt("Driver ID (opcional): ")?),
    };
    match admin.save_vehicle(&form, existing.as_ref()).await {
        Ok(vehicle) => println!("{}", format!("✅ Vehículo {} guardado", vehicle.plate).bright_green()),
        Err(e) => print_error("Save failed", &e),
    }
    Ok(())
}

async fn show_vehicles(coordinator: &DispatchCoordinator) {
    for vehicle in coordinator.vehicles().await {
        println!(
            "{:<12} {:<12} {:<10} {:<12} driver: {}",
            vehicle.id,
            vehicle.plate,
            vehicle.vehicle_type,
            vehicle.status,
            vehicle.assigned_driver().unwrap_or("-")
        );
    }
}

async fn show_drivers(coordinator: &DispatchCoordinator) {
    for driver in coordinator.drivers().await {
        println!(
            "{:<12} {:<20} {:<4} {:<10} {}",
            driver.id,
            driver.name,
            driver.license_class,
            driver.effective_status(),
            driver.reported_location().unwrap_or("-")
        );
    }
}

async fn pick_job(coordinator: &DispatchCoordinator) -> Result<Option<Job>> {
    let jobs = coordinator.jobs().await;
    for (index, job) in jobs.iter().enumerate() {
        print!("{}. ", index + 1);
        print_job(job);
    }
    Ok(choose(jobs.len())?.map(|index| jobs[index].clone()))
}

async fn pick_vehicle(coordinator: &DispatchCoordinator) -> Result<Option<Vehicle>> {
    let vehicles = coordinator.vehicles().await;
    for (index, vehicle) in vehicles.iter().enumerate() {
        println!("{}. {} ({}) {}", index + 1, vehicle.plate, vehicle.vehicle_type, vehicle.status);
    }
    Ok(choose(vehicles.len())?.map(|index| vehicles[index].clone()))
}

fn read_driver_form(with_id: bool) -> Result<DriverForm> {
    let id = if with_id { prompt("Driver ID: ")? } else { String::new() };
    let name = prompt("Name: ")?;
    let license_class = prompt("License class: ")?;
    let rating = prompt("Rating (opcional): ")?.parse::<f64>().ok();
    Ok(DriverForm {
        id,
        name,
        license_class,
        rating,
    })
}

fn print_credentials(credentials: &CredentialSync) {
    match credentials {
        CredentialSync::Synced { username } => println!(
            "{}",
            format!("✅ Conductor guardado. Login: {} / <Driver ID>", username).bright_green()
        ),
        CredentialSync::Failed { username, error } => println!(
            "{}",
            format!(
                "⚠️ Conductor guardado pero el login '{}' no se pudo crear: {}",
                username,
                error.alert()
            )
            .bright_yellow()
        ),
    }
}

// ==================== CONDUCTOR ====================

async fn driver_console(
    coordinator: &Arc<DispatchCoordinator>,
    session: &SessionStore,
    config: &EnvironmentConfig,
) -> Result<()> {
    let portal = match DriverPortal::open(coordinator.clone(), session).await {
        Ok(portal) => Arc::new(portal),
        Err(e) => {
            print_error("Portal unavailable", &e);
            session.end().await;
            return Ok(());
        }
    };
    let poller = PollerHandle::for_portal(portal.clone(), config.portal_poll_interval());
    show_portal(&portal.load().await);

    loop {
        if !session.is_authenticated().await {
            break;
        }

        println!();
        println!("{}", "🧑‍✈️ PORTAL DEL CONDUCTOR".bright_green().bold());
        println!("{}", "========================".bright_green());
        println!("1. 🔄 Refrescar");
        println!("2. ✅ Disponible");
        println!("3. 🌴 Tomar licencia");
        println!("4. 🚨 Reportar emergencia");
        println!("5. 📍 Actualizar ubicación");
        println!("6. 🏁 Marcar llegada");
        println!("7. 🚩 Marcar parada");
        println!("0. 🚪 Logout");
        let choice = prompt("Selecciona una opción: ")?;

        let result = match choice.as_str() {
            "1" => Ok(Some(portal.load().await)),
            "2" => portal.set_available().await.map(Some),
            "3" => portal.take_leave().await.map(Some),
            "4" => portal.raise_emergency(&StdinConfirmation).await,
            "5" => {
                let location = prompt("Location: ")?;
                portal.update_location(&location).await.map(Some)
            }
            "6" => portal.mark_arrival().await.map(Some),
            "7" => {
                let state = portal.state().await;
                match state.active_job {
                    Some(job) => {
                        let stop = prompt("Stop name: ")?;
                        match coordinator.mark_stop(&job.id, &stop).await {
                            Ok(()) => Ok(Some(portal.load().await)),
                            Err(e) => Err(e),
                        }
                    }
                    None => Err(AppError::NoActiveJob(portal.driver_id().to_string())),
                }
            }
            "0" => {
                session.end().await;
                break;
            }
            _ => {
                println!("{}", "❌ Opción inválida. Intenta de nuevo.".bright_red());
                Ok(None)
            }
        };

        match result {
            Ok(Some(state)) => show_portal(&state),
            Ok(None) => {}
            Err(e) => print_error("Action failed", &e),
        }
    }

    poller.shutdown().await;
    Ok(())
}

fn show_portal(state: &PortalState) {
    println!();
    if let Some(message) = &state.blocking_error {
        println!("{}", format!("⛔ {}", message).bright_red().bold());
        return;
    }

    match &state.profile {
        Some(driver) => {
            let status = driver.effective_status();
            println!(
                "{} - {} ({})",
                driver.name.bright_cyan().bold(),
                status.label(),
                status
            );
            println!("📍 {}", driver.reported_location().unwrap_or("Unknown"));
        }
        None => println!("{}", "Cargando perfil...".dimmed()),
    }

    match &state.active_job {
        Some(job) => {
            println!("{}", "🚚 Misión activa".bright_yellow().bold());
            print_job(job);
            for stop in &job.stops {
                let mark = if stop.reached_at.is_some() { "✔" } else { "·" };
                println!("   {} {}", mark, stop.name);
            }
        }
        None => println!("{}", "Sin misión activa".dimmed()),
    }
}

// ==================== ENTRADA / SALIDA ====================

/// Confirmación sí/no leída de stdin
struct StdinConfirmation;

impl Confirmation for StdinConfirmation {
    fn confirm(&self, question: &str) -> bool {
        match prompt(&format!("{} (y/N): ", question)) {
            Ok(answer) => matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes" | "s" | "si"),
            Err(e) => {
                error!("❌ Error leyendo la confirmación: {}", e);
                false
            }
        }
    }
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label.bright_yellow());
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Índice elegido (base 0), o `None` si la entrada no es válida
fn choose(len: usize) -> io::Result<Option<usize>> {
    if len == 0 {
        println!("{}", "(vacío)".dimmed());
        return Ok(None);
    }
    let raw = prompt(&format!("Número (1-{}): ", len))?;
    Ok(raw
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=len).contains(n))
        .map(|n| n - 1))
}

fn print_job(job: &Job) {
    println!(
        "[{}] {} -> {} {} vehicle: {} driver: {}",
        job.short_id(),
        job.pickup,
        job.destination,
        job.status.as_str().bold(),
        job.vehicle_id.as_deref().unwrap_or("-"),
        job.driver_id.as_deref().unwrap_or("-")
    );
}

fn print_error(context: &str, e: &AppError) {
    println!("{}", format!("❌ {}: {}", context, e.alert()).bright_red());
}

fn report<T>(result: Result<T, AppError>, context: &str) {
    match result {
        Ok(_) => println!("{}", "✅ Hecho".bright_green()),
        Err(e) => print_error(context, &e),
    }
}

/// Para las acciones con confirmación: `Ok(false)` = el operador no confirmó
fn report_confirmed(result: Result<bool, AppError>, context: &str) {
    match result {
        Ok(true) => println!("{}", "✅ Hecho".bright_green()),
        Ok(false) => println!("{}", "↩️ Cancelado".dimmed()),
        Err(e) => print_error(context, &e),
    }
}
