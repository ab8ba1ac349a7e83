use super::Tier;

/// Everything the monitor tells the outside world
#[derive(Debug, PartialEq, Clone)]
pub enum Alert {
    Started {
        label: String,
    },
    ConnectionLost,
    Reconnected,
    Cycle {
        tier: Tier,
        label: String,
        moisture: Option<String>,
    },
}

impl Alert {
    pub fn render(&self) -> String {
        match self {
            Alert::Started { label } => format!(
                "{} detection system started. Monitoring in progress...",
                capitalize(&humanize(label))
            ),
            Alert::ConnectionLost => "Connection lost with camera. Retrying...".to_string(),
            Alert::Reconnected => "Camera reconnected. Resuming monitoring.".to_string(),
            Alert::Cycle {
                tier,
                label,
                moisture,
                ..
            } => {
                let label = humanize(label);
                let moisture = moisture.as_deref().unwrap_or("unavailable");
                match tier {
                    Tier::High => format!(
                        "{} detected multiple times with high confidence.\nAction required.\nMoisture: {}",
                        capitalize(&label),
                        moisture
                    ),
                    Tier::Low => format!(
                        "Possible {} activity detected.\nPlease inspect the bee box.\nMoisture: {}",
                        label, moisture
                    ),
                    Tier::None => format!(
                        "No significant {} activity detected.\nMoisture: {}",
                        label, moisture
                    ),
                }
            }
        }
    }
}

/// `wax_moth` -> `wax moth`
fn humanize(label: &str) -> String {
    label.replace('_', " ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
