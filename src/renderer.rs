//! HTML page rendering
//!
//! Templates live in `templates/` and are compiled into the binary. Rendering
//! is a pure function of its inputs. Callers pass the provider's current
//! date, which bounds the date picker and the "next day" link.

use askama::Template;
use chrono::{Days, NaiveDate};

use crate::errors::RenderError;
use crate::models::{ApodRecord, DATE_FORMAT, FIRST_APOD_DATE, MediaType};

/// URL prefix cached media is served under
pub const MEDIA_ROUTE: &str = "/media";

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    title: &'a str,
    date: String,
    explanation: &'a str,
    copyright: &'a str,
    is_image: bool,
    is_video: bool,
    media_src: String,
    hd_url: &'a str,
    prev_date: String,
    next_date: String,
    selected_date: String,
    min_date: String,
    max_date: String,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate<'a> {
    message: &'a str,
    selected_date: String,
    min_date: String,
    max_date: String,
}

pub struct PageRenderer;

impl PageRenderer {
    /// Render the page for `record`. With `cached_media` set the media
    /// element points at the local copy, otherwise at the remote URL.
    pub fn render(
        record: &ApodRecord,
        cached_media: Option<&str>,
        today: NaiveDate,
    ) -> Result<String, RenderError> {
        let media_src = match cached_media {
            Some(file) => format!("{MEDIA_ROUTE}/{file}"),
            None => record.media_url.clone(),
        };

        let prev_date = record
            .date
            .checked_sub_days(Days::new(1))
            .filter(|d| *d >= FIRST_APOD_DATE);
        let next_date = record
            .date
            .checked_add_days(Days::new(1))
            .filter(|d| *d <= today);

        let template = IndexTemplate {
            title: &record.title,
            date: format_date(record.date),
            explanation: &record.explanation,
            copyright: record.copyright.as_deref().unwrap_or_default(),
            is_image: record.media_type == MediaType::Image,
            is_video: record.media_type == MediaType::Video,
            media_src,
            hd_url: record.hd_url.as_deref().unwrap_or_default(),
            prev_date: prev_date.map(format_date).unwrap_or_default(),
            next_date: next_date.map(format_date).unwrap_or_default(),
            selected_date: format_date(record.date),
            min_date: format_date(FIRST_APOD_DATE),
            max_date: format_date(today),
        };

        Ok(template.render()?)
    }

    /// Render the error page. It never references any media.
    pub fn render_error(message: &str, today: NaiveDate) -> Result<String, RenderError> {
        let template = ErrorTemplate {
            message,
            selected_date: String::new(),
            min_date: format_date(FIRST_APOD_DATE),
            max_date: format_date(today),
        };

        Ok(template.render()?)
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
