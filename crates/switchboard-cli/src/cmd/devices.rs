use crate::input::{self, DeviceEntry};

pub fn run(json: bool) -> anyhow::Result<()> {
    let devices = input::list_key_devices();

    if json {
        let entries: Vec<_> = devices
            .iter()
            .map(|d| {
                serde_json::json!({
                    "path": d.path.display().to_string(),
                    "name": d.name,
                })
            })
            .collect();
        let report = serde_json::json!({ "devices": entries });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No key-capable input devices found (check /dev/input permissions).");
        return Ok(());
    }

    print!("{}", render_listing(&devices));
    Ok(())
}

/// Path column padded so the names line up; names are left ragged.
fn render_listing(devices: &[DeviceEntry]) -> String {
    let paths: Vec<String> = devices
        .iter()
        .map(|d| d.path.display().to_string())
        .collect();
    let width = paths
        .iter()
        .map(String::len)
        .max()
        .unwrap_or(0)
        .max("PATH".len());

    let mut out = String::new();
    out.push_str(&format!("{:width$}  NAME\n", "PATH"));
    out.push_str(&format!(
        "{}  {}\n",
        "-".repeat(width),
        "-".repeat("NAME".len())
    ));
    for (path, device) in paths.iter().zip(devices) {
        out.push_str(&format!("{path:width$}  {}\n", device.name));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::render_listing;
    use crate::input::DeviceEntry;

    fn entry(path: &str, name: &str) -> DeviceEntry {
        DeviceEntry {
            path: PathBuf::from(path),
            name: name.to_string(),
        }
    }

    #[test]
    fn listing_aligns_the_name_column() {
        let devices = vec![
            entry("/dev/input/event3", "binepad BNK8"),
            entry("/dev/input/event10", "AT Translated Set 2 keyboard"),
        ];
        let out = render_listing(&devices);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("PATH"));
        let col = lines[0].find("NAME").unwrap();
        assert_eq!(lines[2].find("binepad BNK8"), Some(col));
        assert_eq!(lines[3].find("AT Translated"), Some(col));
    }
}
