//! HTML rendering for the single upload page.

use crate::domain::MedicationRecord;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
<meta charset="utf-8">
<title>Simulador de Farmácia</title>
<style>
body { font-family: sans-serif; max-width: 48rem; margin: 2rem auto; }
.messages { color: #a33; }
table { border-collapse: collapse; width: 100%; margin-top: 1.5rem; }
th, td { border: 1px solid #ccc; padding: 0.4rem 0.6rem; text-align: left; }
</style>
</head>
<body>
<h1>Simulador de Farmácia</h1>
"#;

const UPLOAD_FORM: &str = r#"<form method="post" action="/" enctype="multipart/form-data">
<p><label>Arquivo .med: <input type="file" name="med_file" accept=".med"></label></p>
<p><label>Arquivo .key: <input type="file" name="key_file" accept=".key"></label></p>
<p><button type="submit">Ler prescrição</button></p>
</form>
"#;

const PAGE_FOOT: &str = "</body>\n</html>\n";

/// Render the page with optional status messages and medication rows.
#[must_use]
pub fn render_index(records: &[MedicationRecord], messages: &[String]) -> String {
    let mut html = String::with_capacity(PAGE_HEAD.len() + UPLOAD_FORM.len() + 256);
    html.push_str(PAGE_HEAD);

    if !messages.is_empty() {
        html.push_str("<ul class=\"messages\">\n");
        for message in messages {
            html.push_str(&format!("<li>{}</li>\n", escape_html(message)));
        }
        html.push_str("</ul>\n");
    }

    html.push_str(UPLOAD_FORM);

    if !records.is_empty() {
        html.push_str(
            "<table>\n<thead><tr><th>Medicamento</th><th>Dose</th><th>Administração</th></tr></thead>\n<tbody>\n",
        );
        for record in records {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape_html(&record.medication),
                escape_html(&record.dose),
                escape_html(&record.administration),
            ));
        }
        html.push_str("</tbody>\n</table>\n");
    }

    html.push_str(PAGE_FOOT);
    html
}

/// Escape text for HTML element and attribute content.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
