use crate::domain::model::{ArchiveFilter, QueueStats, ThesisDocument};
use crate::domain::services::truncate_chars;
use std::fmt::Write;

const STYLE: &str = r#"
        body { font-family: system-ui, sans-serif; margin: 2rem; }
        .cards { display: flex; gap: 1rem; margin-bottom: 2rem; flex-wrap: wrap; }
        .card { padding: 1rem 1.5rem; border-radius: 8px; background: #f5f5f5; }
        table { border-collapse: collapse; width: 100%; }
        th, td { border: 1px solid #ddd; padding: 8px; font-size: 0.9rem; }
        th { background: #eee; }
        form { margin-bottom: 1.5rem; }
        label { margin-right: 0.5rem; }
        input { margin-right: 1rem; }
"#;

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn rubro_preview(rubro: &str, max_chars: usize) -> String {
    format!("{}...", escape_html(truncate_chars(rubro, max_chars)))
}

pub fn render_rows(documents: &[ThesisDocument], preview_chars: usize) -> String {
    let mut rows = String::new();
    for doc in documents {
        // writing into a String cannot fail
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&doc.registro),
            rubro_preview(&doc.rubro, preview_chars),
            escape_html(&doc.epoca),
            escape_html(&doc.materia),
        );
    }
    rows
}

pub fn render_dashboard(
    stats: &QueueStats,
    documents: &[ThesisDocument],
    filter: &ArchiveFilter,
    preview_chars: usize,
) -> String {
    let epoca = escape_html(filter.epoca.as_deref().unwrap_or_default());
    let materia = escape_html(filter.materia.as_deref().unwrap_or_default());
    let rows = render_rows(documents, preview_chars);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Acervo Worker Dashboard</title>
    <style>{style}</style>
</head>
<body>
    <h1>Acervo Worker Dashboard</h1>
    <div class="cards">
        <div class="card"><strong>Total en cola:</strong> {total}</div>
        <div class="card"><strong>Pendientes:</strong> {pending}</div>
        <div class="card"><strong>Procesando:</strong> {processing}</div>
        <div class="card"><strong>Completados:</strong> {completed}</div>
        <div class="card"><strong>Errores:</strong> {failed}</div>
    </div>

    <h2>Filtros</h2>
    <form method="get" action="/">
        <label>Época:</label>
        <input type="text" name="epoca" value="{epoca}" />
        <label>Materia:</label>
        <input type="text" name="materia" value="{materia}" />
        <button type="submit">Filtrar</button>
    </form>

    <h2>Últimos {count} registros procesados</h2>
    <table>
        <tr>
            <th>Registro</th>
            <th>Rubro</th>
            <th>Época</th>
            <th>Materia</th>
        </tr>
        {rows}
    </table>
</body>
</html>
"#,
        style = STYLE,
        total = stats.total,
        pending = stats.pending,
        processing = stats.processing,
        completed = stats.completed,
        failed = stats.failed,
        epoca = epoca,
        materia = materia,
        count = documents.len(),
        rows = rows,
    )
}

pub fn render_connecting() -> String {
    concat!(
        "<h1>⏳ Conectando a la base de datos...</h1>",
        "<p>La API está iniciando. Recarga en unos segundos.</p>",
        r#"<meta http-equiv="refresh" content="5">"#,
    )
    .to_string()
}
