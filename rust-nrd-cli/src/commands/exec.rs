//! Script runner: applies a sequence of RIB commands to an in-process
//! service.
//!
//! Script grammar, one command per line (`#` starts a comment):
//!
//! ```text
//! identity /A
//! register /A/app 1 origin=app cost=10 flags=child-inherit expires=5000
//! unregister /A/app 1 origin=app
//! face-down 1
//! remove-failed-faces 2,3
//! sleep 100
//! show
//! ```

use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use rust_nrd_common::name::Name;
use rust_nrd_common::types::{FaceId, RouteFlags, RouteOrigin};
use rust_nrd_rib::{ControlParameters, RibHandle};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

pub async fn run_script(script: &Path) -> Result<()> {
    let text = fs::read_to_string(script)
        .await
        .with_context(|| format!("Failed to read script {}", script.display()))?;

    let (handle, key_chain, join) = super::start_service();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        debug!("script line {}: {line}", line_no + 1);
        run_line(&handle, &key_chain, line)
            .await
            .with_context(|| format!("script line {}: {line}", line_no + 1))?;
    }

    handle.shutdown();
    join.await?;
    Ok(())
}

async fn run_line(
    handle: &RibHandle,
    key_chain: &std::rc::Rc<std::cell::RefCell<rust_nrd_rib::KeyChain>>,
    line: &str,
) -> Result<()> {
    let mut tokens = line.split_whitespace();
    let Some(verb) = tokens.next() else {
        return Ok(());
    };
    let rest: Vec<&str> = tokens.collect();

    match verb {
        "identity" => {
            let name = positional(&rest, 0, "identity name")?;
            key_chain
                .borrow_mut()
                .create_identity(Name::from_string(name));
            println!("identity {name}");
        }
        "register" => {
            let params = parse_route_params(&rest, true)?;
            let response = handle.register(params).await?;
            println!("register -> {response}");
        }
        "unregister" => {
            let params = parse_route_params(&rest, false)?;
            let response = handle.unregister(params).await?;
            println!("unregister -> {response}");
        }
        "face-down" => {
            let face: u64 = positional(&rest, 0, "face id")?
                .parse()
                .context("invalid face id")?;
            handle.face_down(FaceId(face));
            println!("face-down {face}");
        }
        "remove-failed-faces" => {
            let mut active = BTreeSet::new();
            if let Some(list) = rest.first() {
                for id in list.split(',').filter(|s| !s.is_empty()) {
                    active.insert(FaceId(id.parse().context("invalid face id")?));
                }
            }
            handle.remove_failed_faces(active);
            println!("remove-failed-faces");
        }
        "sleep" => {
            let ms: u64 = positional(&rest, 0, "milliseconds")?
                .parse()
                .context("invalid sleep duration")?;
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        "show" => {
            let dump = handle.dump().await?;
            println!("{dump}");
        }
        other => bail!("unknown command {other:?}"),
    }

    Ok(())
}

fn positional<'a>(rest: &[&'a str], index: usize, what: &str) -> Result<&'a str> {
    rest.get(index)
        .copied()
        .ok_or_else(|| anyhow!("missing {what}"))
}

/// Parses `<prefix> <face> [key=value...]` into control parameters.
fn parse_route_params(rest: &[&str], allow_register_options: bool) -> Result<ControlParameters> {
    let prefix = positional(rest, 0, "prefix")?;
    let face: u64 = positional(rest, 1, "face id")?
        .parse()
        .context("invalid face id")?;

    let mut params = ControlParameters::new()
        .with_name(Name::from_string(prefix))
        .with_face_id(FaceId(face));

    for option in &rest[2..] {
        let (key, value) = option
            .split_once('=')
            .ok_or_else(|| anyhow!("malformed option {option:?}"))?;
        match key {
            "origin" => {
                params = params.with_origin(value.parse::<RouteOrigin>()?);
            }
            "cost" if allow_register_options => {
                params = params.with_cost(value.parse().context("invalid cost")?);
            }
            "flags" if allow_register_options => {
                let mut flags = RouteFlags::empty();
                for flag in value.split(',').filter(|s| !s.is_empty()) {
                    match flag {
                        "child-inherit" => flags |= RouteFlags::CHILD_INHERIT,
                        "capture" => flags |= RouteFlags::CAPTURE,
                        "none" => {}
                        other => bail!("unknown flag {other:?}"),
                    }
                }
                params = params.with_flags(flags);
            }
            "expires" if allow_register_options => {
                params = params.with_expiration_period(Duration::from_millis(
                    value.parse().context("invalid expiration period")?,
                ));
            }
            other => bail!("unknown option {other:?}"),
        }
    }

    Ok(params)
}
