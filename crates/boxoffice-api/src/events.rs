use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use boxoffice_db::models::{EventRow, NewEvent, TranslationRow};
use boxoffice_types::api::{AssignRequest, EventDeletedResponse, EventIdResponse, EventPage, EventRequest};
use boxoffice_types::models::{Event, EventTranslation};

use crate::auth::{AppState, with_db};
use crate::error::ApiError;
use crate::pagination::{PageParams, PageQuery};

type EventId = WithRejection<Path<i64>, ApiError>;
type Pagination = WithRejection<Query<PageQuery>, ApiError>;

pub(crate) fn event_from_row(row: EventRow) -> Event {
    Event {
        id: row.id,
        name: row.name,
        description: row.description,
        category: row.category,
        date: row.date,
        venue: row.venue,
        price: row.price,
        image: row.image,
        translations: row
            .translations
            .into_iter()
            .map(|t| EventTranslation {
                language: t.language,
                name: t.name,
                description: t.description,
                venue: t.venue,
            })
            .collect(),
    }
}

fn page_of(rows: Vec<EventRow>, params: PageParams) -> Result<EventPage, ApiError> {
    let page = params.apply(rows)?;
    Ok(EventPage {
        events: page.items.into_iter().map(event_from_row).collect(),
        count: page.total,
    })
}

/// Check an event body and turn it into column values. The date must be RFC 3339.
fn validate(req: EventRequest) -> Result<NewEvent, ApiError> {
    let date = DateTime::parse_from_rfc3339(req.date.trim()).map_err(|_| {
        ApiError::BadRequest("invalid date format, only RFC3339 is supported".into())
    })?;

    if req.name.is_empty()
        || req.description.is_empty()
        || req.category.is_empty()
        || req.venue.is_empty()
        || req.price == 0.0
    {
        return Err(ApiError::BadRequest(
            "missing name, description, category, date, venue or price".into(),
        ));
    }
    if !req.price.is_finite() || req.price < 0.0 {
        return Err(ApiError::BadRequest("price must be a non-negative number".into()));
    }

    Ok(NewEvent {
        name: req.name,
        description: req.description,
        category: req.category,
        date: date.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::AutoSi, true),
        venue: req.venue,
        price: req.price,
        image: req.image,
        translations: req
            .translations
            .into_iter()
            .map(|t| TranslationRow {
                language: t.language,
                name: t.name,
                description: t.description,
                venue: t.venue,
            })
            .collect(),
    })
}

/// GET /events?page&limit
pub async fn list_events(
    State(state): State<AppState>,
    WithRejection(Query(query), _): Pagination,
) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, |db| db.list_events()).await?;
    Ok(Json(page_of(rows, query.into())?))
}

/// GET /events/{id}. The only read that includes translations.
pub async fn get_event(
    State(state): State<AppState>,
    WithRejection(Path(id), _): EventId,
) -> Result<impl IntoResponse, ApiError> {
    let event = with_db(&state, move |db| db.get_event(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;

    Ok(Json(event_from_row(event)))
}

/// GET /events/category/{category}?page&limit
pub async fn list_events_by_category(
    State(state): State<AppState>,
    WithRejection(Path(category), _): WithRejection<Path<String>, ApiError>,
    WithRejection(Query(query), _): Pagination,
) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, move |db| db.list_events_by_category(&category)).await?;
    Ok(Json(page_of(rows, query.into())?))
}

/// GET /events/search/{keyword}?page&limit
pub async fn search_events(
    State(state): State<AppState>,
    WithRejection(Path(keyword), _): WithRejection<Path<String>, ApiError>,
    WithRejection(Query(query), _): Pagination,
) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, move |db| db.search_events(&keyword)).await?;
    Ok(Json(page_of(rows, query.into())?))
}

/// POST /events (admin)
pub async fn create_event(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<EventRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let event = validate(req)?;

    let event_id = with_db(&state, move |db| db.create_event(&event)).await?;
    info!("created event {}", event_id);

    Ok((StatusCode::CREATED, Json(EventIdResponse { event_id })))
}

/// PUT /events/{id} (admin). Overwrites every field and replaces all translations.
pub async fn update_event(
    State(state): State<AppState>,
    WithRejection(Path(id), _): EventId,
    WithRejection(Json(req), _): WithRejection<Json<EventRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if id == 0 {
        return Err(ApiError::BadRequest("invalid id, pass a valid one".into()));
    }
    let event = validate(req)?;

    let updated = with_db(&state, move |db| db.update_event(id, &event)).await?;
    if !updated {
        return Err(ApiError::NotFound("Event not found".into()));
    }

    Ok(Json(EventIdResponse { event_id: id }))
}

/// DELETE /events/{id} (admin)
pub async fn delete_event(
    State(state): State<AppState>,
    WithRejection(Path(id), _): EventId,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = with_db(&state, move |db| db.delete_event(id)).await?;
    if !deleted {
        return Err(ApiError::NotFound("Event not found".into()));
    }

    info!("deleted event {}", id);
    Ok(Json(EventDeletedResponse {
        id,
        message: "the event with the above id was deleted successfully".into(),
    }))
}

/// POST /events/assign/{id} (self or admin, owner taken from the body's `userId`)
///
/// Enrolls the user and spends one of their tickets. The two writes are not
/// atomic, and the balance is not checked before the decrement.
pub async fn assign_event(
    State(state): State<AppState>,
    WithRejection(Path(event_id), _): EventId,
    WithRejection(Json(req), _): WithRejection<Json<AssignRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = req.user_id;
    if event_id == 0 || user_id == 0 {
        return Err(ApiError::BadRequest("missing event id or user id".into()));
    }

    with_db(&state, move |db| {
        if db.get_user_by_id(user_id)?.is_none() {
            return Err(boxoffice_db::DbError::NotFound(format!(
                "user with id '{}' not found",
                user_id
            )));
        }
        db.register_user_to_event(user_id, event_id)?;
        db.decrement_tickets(user_id)
    })
    .await
    .map_err(|e| {
        warn!("assigning event {} to user {} failed: {}", event_id, user_id, e);
        e
    })?;

    info!("assigned event {} to user {}", event_id, user_id);
    Ok(Json(EventIdResponse { event_id }))
}
