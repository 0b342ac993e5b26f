use approval_reconciler::config::Config;
use std::path::Path;

pub fn render_status(config: &Config, state_file: &Path) -> String {
    let mut lines = vec![
        "◆ Approval reconciler status".to_string(),
        String::new(),
        format!("Version     {}", env!("CARGO_PKG_VERSION")),
        format!("Config      {}", config.config_path.display()),
        format!("Store       {}", config.store_path().display()),
        format!("Observer    {}", config.observability.backend),
        format!(
            "Workers     {} (poll every {}s, deadline {}s)",
            config.controller.workers,
            config.controller.poll_interval_secs,
            config.controller.reconcile_timeout_secs
        ),
        String::new(),
    ];

    for (name, provider) in &config.providers {
        lines.push(format!("Provider    {name} -> {}", provider.endpoint));
    }
    lines.push(String::new());

    match std::fs::read_to_string(state_file) {
        Ok(contents) => {
            lines.push(format!("Controller state ({})", state_file.display()));
            lines.push(contents);
        }
        Err(_) => lines.push(format!(
            "No controller state at {} (is `approval-reconciler run` active?)",
            state_file.display()
        )),
    }

    lines.join("\n")
}
