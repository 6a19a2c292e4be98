use crate::core::config::data::Config;

fn show<T: std::fmt::Display>(name: &str, value: &Option<T>) {
    match value {
        Some(value) => println!("  {name}: {value}"),
        None => println!("  {name}: (unset)"),
    }
}

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        show("server-url", &self.server_url);
        show("default-worksheet", &self.default_worksheet);
        show("poll-step-ms", &self.poll_step_ms);
        show("poll-cap-ms", &self.poll_cap_ms);
        show("poll-slow-factor", &self.poll_slow_factor);
        show("toast-ms", &self.toast_ms);
        show("sticky-header-lines", &self.sticky_header_lines);
    }
}
