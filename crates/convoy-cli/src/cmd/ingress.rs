use crate::output::{col, num, print_json, print_table};
use anyhow::{Context, Result};
use convoy_core::ingress::IngressRouter;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> Result<()> {
    let router = IngressRouter::load(root).context("failed to load ingress table")?;
    let routes = router.routes();

    if json {
        print_json(&routes)?;
        return Ok(());
    }

    if routes.is_empty() {
        println!("No routes. Run `convoy reconcile` to publish synced units.");
        return Ok(());
    }

    let rows = routes
        .iter()
        .map(|(key, route)| {
            let endpoints = route
                .endpoints
                .iter()
                .map(|e| format!("{}:{}", e.address, e.port))
                .collect::<Vec<_>>()
                .join(",");
            vec![
                key.host.clone(),
                key.path_prefix.clone(),
                route.unit.clone(),
                route.service_port.to_string(),
                endpoints,
            ]
        })
        .collect();
    print_table(
        &[
            col("HOST"),
            col("PATH"),
            col("UNIT"),
            num("PORT"),
            col("ENDPOINTS"),
        ],
        rows,
    );
    Ok(())
}
