use std::fmt::Write;

use crate::gpio::PinReading;

const TITLE: &str = "Pi-Minilog";

const STYLE: &str = r#"
body { color: #414141; background-color: #EEEEEE; }
table { width: 40%; }
th { height: 50px; text-align: left; }
th, td { border-bottom: 1px solid #ddd; }
h1 { font-size: 34px; }
h2 { font-size: 22px; }
h1, h2 { font-family: "Helvetica", "Arial", sans-serif; font-weight: normal; }
button { width: 180px; color: white; font-size: 18px; border-radius: 8px; }
form.login button { color: inherit; }
"#;

/// Everything the overview page shows.
pub struct Overview {
    pub host_name: String,
    pub system_time: String,
    pub log_size: u64,
    pub logging_enabled: bool,
    pub readings: Vec<PinReading>,
}

pub fn login_form() -> String {
    page(
        r#"<form class="login" method="get" action="validate">
<input type="text" value="" placeholder="Enter Username" name="uname" /><br>
<input type="password" value="" placeholder="Enter Password" name="pwd" /><br>
<button type="submit">Login</button><br>
<button type="reset">Reset</button><br>
</form>"#,
    )
}

pub fn overview(view: &Overview) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h2>Host Name: {}</h2>", escape(&view.host_name));
    let _ = writeln!(body, "<h2>System Time: {}</h2>", escape(&view.system_time));
    let _ = writeln!(body, "<h2>Log File Size: {} Bytes</h2>", view.log_size);
    let _ = writeln!(
        body,
        "<h2>Current Logging Status: {}</h2>",
        view.logging_enabled
    );
    body.push_str("<h2>Current Sensor States:</h2>\n");

    body.push_str("<table>\n<tr><th>GPIO-Port</th><th>Pin Nb.</th><th>State</th></tr>\n");
    for reading in &view.readings {
        body.push_str(&table_row(reading));
    }
    body.push_str("</table>\n<hr>\n");

    body.push_str(&button("log_toggle", "Logging ON/OFF", "#008CBA", "left"));
    body.push_str(&button("log_now", "Log Current State", "#008CBA", "left"));
    body.push_str(&button("log_get", "Get Log", "#008CBA", "left"));
    body.push_str(&button("log_clear", "Delete Log", "#f44336", "none"));
    body.push_str("<p>\n");
    body.push_str(&button("view", "Reload", "#4CAF50", "left"));
    body.push_str(&button("shutdownserver", "Shutdown", "#f44336", "none"));

    page(&body)
}

/// The raw log with each line break made visible in a browser.
pub fn log_page(contents: &str) -> String {
    escape(contents).replace('\n', "<br>\n")
}

fn table_row(reading: &PinReading) -> String {
    let state = match &reading.level {
        Ok(level) => level.to_string(),
        Err(e) => format!("error: {}", escape(&e.to_string())),
    };
    format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        reading.port, reading.pin, state
    )
}

fn button(action: &str, label: &str, color: &str, float: &str) -> String {
    format!(
        "<form method=\"get\" action=\"{action}\">\
<button style=\"background-color: {color}; float: {float};\" type=\"submit\">{label}</button>\
</form>\n"
    )
}

fn page(body: &str) -> String {
    format!(
        "<html>\n<head>\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{TITLE}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<h1>{TITLE}</h1>\n{body}\n</body>\n</html>\n"
    )
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
