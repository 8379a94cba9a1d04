//! # Server-rendered Views
//!
//! HTML pages for the browser: the medicine list grouped by time of day, the
//! add/edit forms and the prescription viewer. Pages are plain strings built
//! here; behaviour (form submission, delete buttons, the dark/light theme
//! toggle) lives in `static/app.js`. The theme is a browser-local preference
//! and has no server-side state.

use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use shared::{MedicineListQuery, MedicineType, TimeOfDay};
use std::fmt::Write;
use tracing::info;

use crate::domain::models::medicine::Medicine;
use crate::domain::MedicineError;
use crate::io::rest::extract::{ApiPath, ApiQuery, PRESCRIPTION_FIELD};
use crate::io::rest::mappers::medicine_mapper::MedicineMapper;
use crate::storage::file_store::ACCEPTED_EXTENSIONS;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/ui/medicines/new", get(new_medicine_page))
        .route("/ui/medicines/:id/edit", get(edit_medicine_page))
        .route("/ui/medicines/:id/prescription", get(prescription_page))
}

/// Error rendered as an HTML page instead of JSON
pub struct ViewError(MedicineError);

impl From<MedicineError> for ViewError {
    fn from(error: MedicineError) -> Self {
        ViewError(error)
    }
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        let (status, _) = self.0.status_and_code();
        let message = if status.is_server_error() {
            tracing::error!("Page failed to render: {:?}", self.0);
            "Something went wrong while loading this page.".to_string()
        } else {
            self.0.to_string()
        };
        let body = format!(
            r#"<section class="card error"><h2>{}</h2><p>{}</p><p><a href="/">Back to medicines</a></p></section>"#,
            status.as_u16(),
            escape_html(&message)
        );
        (status, Html(layout("Error", &body))).into_response()
    }
}

/// Medicine list grouped by time of day
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MedicineListQuery>,
) -> Result<Html<String>, ViewError> {
    info!("GET / - query: {:?}", query);

    let medicines = state
        .medicine_service
        .list_medicines(MedicineMapper::to_list_query(query.clone()))
        .await?;

    Ok(Html(layout("My Medicines", &render_list(&medicines, query.time_of_day))))
}

pub async fn new_medicine_page() -> Html<String> {
    info!("GET /ui/medicines/new");
    Html(layout("Add medicine", &render_form(None)))
}

pub async fn edit_medicine_page(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Html<String>, ViewError> {
    info!("GET /ui/medicines/{}/edit", id);

    let medicine = state.medicine_service.get_medicine(id).await?;
    Ok(Html(layout(&format!("Edit {}", medicine.name), &render_form(Some(&medicine)))))
}

pub async fn prescription_page(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Html<String>, ViewError> {
    info!("GET /ui/medicines/{}/prescription", id);

    let medicine = state.medicine_service.get_medicine(id).await?;
    let path = medicine
        .prescription_path
        .as_deref()
        .ok_or_else(|| MedicineError::PrescriptionNotFound(format!("medicine {id} has no prescription")))?;

    let body = format!(
        r#"<section class="card viewer">
  <h2>Prescription for {name}</h2>
  <img src="{url}" alt="Prescription for {name}">
  <p><a href="{url}" download>Download</a> · <a href="/">Back to medicines</a></p>
</section>"#,
        name = escape_html(&medicine.name),
        url = escape_html(&MedicineMapper::prescription_url(path)),
    );
    Ok(Html(layout("Prescription", &body)))
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en" data-theme="light">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title} · Medicine Tracker</title>
  <link rel="stylesheet" href="/static/style.css">
  <script src="/static/app.js" defer></script>
</head>
<body>
  <header class="topbar">
    <h1><a href="/">Medicine Tracker</a></h1>
    <nav>
      <a class="button" href="/ui/medicines/new">Add medicine</a>
      <button type="button" id="theme-toggle" aria-label="Toggle dark mode">Dark mode</button>
    </nav>
  </header>
  <main>
{body}
  </main>
</body>
</html>
"#,
        title = escape_html(title),
    )
}

fn render_list(medicines: &[Medicine], filter: Option<TimeOfDay>) -> String {
    let mut html = String::new();

    html.push_str(r#"<nav class="filters">"#);
    let _ = write!(
        html,
        r#"<a href="/" class="{}">All</a>"#,
        if filter.is_none() { "selected" } else { "" }
    );
    for time in TimeOfDay::ALL {
        let _ = write!(
            html,
            r#"<a href="/?time_of_day={}" class="{}">{}</a>"#,
            time.as_str(),
            if filter == Some(time) { "selected" } else { "" },
            time.label()
        );
    }
    html.push_str("</nav>");

    if medicines.is_empty() {
        html.push_str(r#"<p class="empty">No medicines yet. <a href="/ui/medicines/new">Add one</a>.</p>"#);
        return html;
    }

    let times: Vec<TimeOfDay> = match filter {
        Some(time) => vec![time],
        None => TimeOfDay::ALL.to_vec(),
    };

    for time in times {
        let mut group: Vec<&Medicine> = medicines.iter().filter(|m| m.is_taken_at(time)).collect();
        if group.is_empty() {
            continue;
        }
        group.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.id.cmp(&b.id)));

        let _ = write!(
            html,
            r#"<section class="time-group" id="{}"><h2>{}</h2><ul class="medicines">"#,
            time.as_str(),
            time.label()
        );
        for medicine in group {
            html.push_str(&render_card(medicine));
        }
        html.push_str("</ul></section>");
    }

    html
}

fn render_card(medicine: &Medicine) -> String {
    let times = medicine
        .time_of_day
        .iter()
        .map(TimeOfDay::label)
        .collect::<Vec<_>>()
        .join(", ");

    let notes = medicine
        .notes
        .as_deref()
        .map(|notes| format!(r#"<p class="notes">{}</p>"#, escape_html(notes)))
        .unwrap_or_default();

    let prescription = if medicine.prescription_path.is_some() {
        format!(r#"<a href="/ui/medicines/{}/prescription">View prescription</a>"#, medicine.id)
    } else {
        String::new()
    };

    format!(
        r#"<li class="card medicine {inactive}" data-id="{id}">
  <div class="summary">
    <span class="badge {kind}">{kind_label}</span>
    <strong>{name}</strong> <span class="dosage">{dosage}</span>{paused}
  </div>
  <p class="times">{times}</p>
  {notes}
  <div class="actions">
    {prescription}
    <a href="/ui/medicines/{id}/edit">Edit</a>
    <button type="button" class="delete" data-delete="/medicines/{id}" data-name="{name}">Delete</button>
  </div>
</li>"#,
        id = medicine.id,
        inactive = if medicine.active { "" } else { "inactive" },
        kind = medicine.medicine_type.as_str(),
        kind_label = type_label(medicine.medicine_type),
        name = escape_html(&medicine.name),
        dosage = escape_html(&medicine.dosage),
        paused = if medicine.active { "" } else { r#" <span class="paused">(paused)</span>"# },
    )
}

fn render_form(existing: Option<&Medicine>) -> String {
    let (action, method, heading) = match existing {
        Some(medicine) => (format!("/medicines/{}", medicine.id), "PUT", "Edit medicine"),
        None => ("/medicines".to_string(), "POST", "Add medicine"),
    };

    let value = |field: fn(&Medicine) -> &str| existing.map(field).map(escape_html).unwrap_or_default();
    let name = value(|m| m.name.as_str());
    let dosage = value(|m| m.dosage.as_str());
    let notes = value(|m| m.notes.as_deref().unwrap_or_default());

    let current_type = existing.map(|m| m.medicine_type).unwrap_or(MedicineType::Tablet);
    let type_options: String = [MedicineType::Tablet, MedicineType::Syrup]
        .iter()
        .map(|kind| {
            format!(
                r#"<option value="{}"{}>{}</option>"#,
                kind.as_str(),
                selected(*kind == current_type),
                type_label(*kind)
            )
        })
        .collect();

    let time_boxes: String = TimeOfDay::ALL
        .iter()
        .map(|time| {
            let checked = existing.map(|m| m.is_taken_at(*time)).unwrap_or(false);
            format!(
                r#"<label class="check"><input type="checkbox" name="time_of_day" value="{}"{}> {}</label>"#,
                time.as_str(),
                if checked { " checked" } else { "" },
                time.label()
            )
        })
        .collect();

    let active = existing.map(|m| m.active).unwrap_or(true);

    let accept = ACCEPTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");

    let current_prescription = match existing {
        Some(medicine) if medicine.prescription_path.is_some() => format!(
            r#"<p class="current-prescription"><a href="/ui/medicines/{}/prescription">Current prescription</a>
  <label class="check"><input type="checkbox" name="remove_prescription" value="true"> Remove</label></p>"#,
            medicine.id
        ),
        _ => String::new(),
    };

    format!(
        r#"<section class="card">
<h2>{heading}</h2>
<form class="medicine-form" data-action="{action}" data-method="{method}" enctype="multipart/form-data">
  <label>Name <input name="name" required maxlength="100" value="{name}"></label>
  <label>Type <select name="type">{type_options}</select></label>
  <label>Dosage <input name="dosage" required maxlength="50" placeholder="500mg or 10ml" value="{dosage}"></label>
  <fieldset><legend>Time of day</legend>{time_boxes}</fieldset>
  <label>Notes <textarea name="notes" maxlength="500">{notes}</textarea></label>
  <label>Status <select name="active">
    <option value="true"{active_yes}>Taking</option>
    <option value="false"{active_no}>Paused</option>
  </select></label>
  {current_prescription}
  <label>Prescription image <input type="file" name="{PRESCRIPTION_FIELD}" accept="{accept}"></label>
  <p class="form-error" role="alert" hidden></p>
  <div class="actions">
    <button type="submit">Save</button>
    <a href="/">Cancel</a>
  </div>
</form>
</section>"#,
        active_yes = selected(active),
        active_no = selected(!active),
    )
}

fn selected(is_selected: bool) -> &'static str {
    if is_selected {
        " selected"
    } else {
        ""
    }
}

fn type_label(kind: MedicineType) -> &'static str {
    match kind {
        MedicineType::Tablet => "Tablet",
        MedicineType::Syrup => "Syrup",
    }
}

/// Escape text for use in HTML content and quoted attributes
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn medicine(id: i64, name: &str, times: &[TimeOfDay]) -> Medicine {
        Medicine {
            id,
            name: name.to_string(),
            medicine_type: MedicineType::Tablet,
            dosage: "5mg".to_string(),
            time_of_day: times.to_vec(),
            notes: None,
            active: true,
            prescription_path: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#39;y&#39;&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_list_groups_by_time_of_day() {
        let medicines = vec![
            medicine(1, "Zinc", &[TimeOfDay::Morning, TimeOfDay::Evening]),
            medicine(2, "Aspirin", &[TimeOfDay::Evening]),
        ];

        let html = render_list(&medicines, None);

        let morning = html.find(r#"id="morning""#).unwrap();
        let evening = html.find(r#"id="evening""#).unwrap();
        assert!(morning < evening);
        assert!(!html.contains(r#"id="afternoon""#));

        // Within the evening group names are alphabetical
        let evening_html = &html[evening..];
        assert!(evening_html.find("Aspirin").unwrap() < evening_html.find("Zinc").unwrap());
    }

    #[test]
    fn test_list_escapes_user_text() {
        let html = render_list(&[medicine(1, "<b>bold</b>", &[TimeOfDay::Morning])], None);
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!html.contains("<b>bold</b>"));
    }

    #[test]
    fn test_empty_list() {
        let html = render_list(&[], Some(TimeOfDay::Afternoon));
        assert!(html.contains("No medicines yet"));
        assert!(html.contains(r#"href="/?time_of_day=afternoon" class="selected""#));
    }

    #[test]
    fn test_edit_form_prefills_values() {
        let mut existing = medicine(7, "Cough syrup", &[TimeOfDay::Evening]);
        existing.medicine_type = MedicineType::Syrup;
        existing.prescription_path = Some("1_a.png".to_string());

        let html = render_form(Some(&existing));
        assert!(html.contains(r#"data-action="/medicines/7" data-method="PUT""#));
        assert!(html.contains(r#"value="Cough syrup""#));
        assert!(html.contains(r#"<option value="syrup" selected>"#));
        assert!(html.contains(r#"value="evening" checked"#));
        assert!(html.contains(r#"name="remove_prescription""#));
    }

    #[test]
    fn test_new_form_defaults() {
        let html = render_form(None);
        assert!(html.contains(r#"data-action="/medicines" data-method="POST""#));
        assert!(html.contains(r#"<option value="true" selected>Taking</option>"#));
        assert!(!html.contains("remove_prescription"));
        assert!(html.contains(r#"accept=".png,.jpg,.jpeg,.gif,.webp""#));
    }
}
