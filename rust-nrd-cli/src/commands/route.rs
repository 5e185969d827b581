//! Route command implementation for the rust-nrd CLI

use anyhow::{Context, Result};
use log::info;
use rust_nrd_common::name::Name;
use rust_nrd_common::types::{FaceId, RouteFlags, RouteOrigin};
use rust_nrd_rib::ControlParameters;
use std::time::Duration;

use crate::RouteCommands;

/// Handle route-related commands
pub async fn handle_command(cmd: RouteCommands) -> Result<()> {
    match cmd {
        RouteCommands::Add {
            prefix,
            face,
            origin,
            cost,
            child_inherit,
            capture,
            expires_ms,
        } => add_route(prefix, face, origin, cost, child_inherit, capture, expires_ms).await,
        RouteCommands::Remove {
            prefix,
            face,
            origin,
        } => remove_route(prefix, face, origin).await,
        RouteCommands::Show => show_routes().await,
    }
}

/// Register a route in an in-process RIB and print the result
async fn add_route(
    prefix: String,
    face: u64,
    origin: String,
    cost: u64,
    child_inherit: bool,
    capture: bool,
    expires_ms: Option<u64>,
) -> Result<()> {
    info!("Registering route: prefix={prefix}, face={face}, cost={cost}");

    let origin: RouteOrigin = origin.parse().context("Invalid route origin")?;
    let mut params = ControlParameters::new()
        .with_name(Name::from_string(&prefix))
        .with_face_id(FaceId(face))
        .with_origin(origin)
        .with_cost(cost);

    if child_inherit || capture {
        let mut flags = RouteFlags::empty();
        if child_inherit {
            flags |= RouteFlags::CHILD_INHERIT;
        }
        if capture {
            flags |= RouteFlags::CAPTURE;
        }
        params = params.with_flags(flags);
    }
    if let Some(ms) = expires_ms {
        params = params.with_expiration_period(Duration::from_millis(ms));
    }

    let (handle, _key_chain, join) = super::start_service();
    let response = handle.register(params).await?;
    println!("{response}");
    if response.is_success() {
        println!("Added route: {prefix} -> face {face} (cost {cost})");
    }

    handle.shutdown();
    join.await?;
    Ok(())
}

/// Unregister a route from an in-process RIB and print the result
async fn remove_route(prefix: String, face: u64, origin: String) -> Result<()> {
    info!("Unregistering route: prefix={prefix}, face={face}");

    let origin: RouteOrigin = origin.parse().context("Invalid route origin")?;
    let params = ControlParameters::new()
        .with_name(Name::from_string(&prefix))
        .with_face_id(FaceId(face))
        .with_origin(origin);

    let (handle, _key_chain, join) = super::start_service();
    let response = handle.unregister(params).await?;
    println!("{response}");

    handle.shutdown();
    join.await?;
    Ok(())
}

/// Show the RIB of a fresh in-process service
async fn show_routes() -> Result<()> {
    let (handle, _key_chain, join) = super::start_service();
    let dump = handle.dump().await?;
    println!("{dump}");
    println!("A one-shot RIB starts empty; use `rust-nrd-cli exec <script>` to");
    println!("apply a sequence of registrations and inspect the result.");

    handle.shutdown();
    join.await?;
    Ok(())
}
