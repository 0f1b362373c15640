use anyhow::Result;
use colored::*;
use std::io::{self, Write};
use std::sync::Arc;

use fleet_dispatch::clients::{FleetGateway, HttpGateway};
use fleet_dispatch::config::environment::EnvironmentConfig;
use fleet_dispatch::models::LoginRequest;
use fleet_dispatch::services::HealthService;
use fleet_dispatch::state::{SessionContext, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = EnvironmentConfig::from_env()?;

    println!("{}", "🩺 Fleet Gateway Health Check".bright_blue().bold());
    println!("{}", "=============================".bright_blue());
    println!("Fleet:    {}", config.fleet_base_url);
    println!("Drivers:  {}", config.driver_base_url);
    println!("Dispatch: {}", config.dispatch_base_url);
    println!();

    let session = SessionStore::new();
    let gateway = Arc::new(HttpGateway::from_config(&config, session.clone())?);

    // Paso 1: credenciales (opcional si el gateway no exige token)
    print!("{}", "Username (vacío = sin login): ".bright_yellow());
    io::stdout().flush()?;
    let username = read_line()?;
    if !username.is_empty() {
        print!("{}", "Password: ".bright_yellow());
        io::stdout().flush()?;
        let password = read_line()?;

        match gateway.login(&LoginRequest { username: username.clone(), password }).await {
            Ok(response) => {
                session.begin(SessionContext::from_login(&username, &response)).await;
                println!("{}", "✅ Login exitoso".bright_green());
            }
            Err(e) => println!("{}", format!("❌ Login falló: {}", e.alert()).bright_red()),
        }
    }

    // Paso 2: probar cada servicio
    println!();
    let report = HealthService::new(gateway).probe().await;
    for (name, health) in report.services() {
        let line = format!("{:<18} {}", name, health);
        if health.is_online() {
            println!("{}", line.bright_green());
        } else {
            println!("{}", line.bright_red());
        }
    }

    if !report.all_online() {
        std::process::exit(1);
    }
    Ok(())
}

fn read_line() -> io::Result<String> {
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
