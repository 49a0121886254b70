//! Response rendering.
//!
//! # Responsibilities
//! - Turn MockResponse and RouteError into HTTP responses
//! - Render the IMDS XHTML error page
//!
//! # Design Decisions
//! - Error bodies never include internal state (token ids, reasons)
//! - `Server` and `x-request-id` are added by layers, not here

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::routing::{MockResponse, RouteError};

/// The XHTML document real IMDS sends with error statuses.
pub fn error_page(status: StatusCode) -> String {
    let title = match status.canonical_reason() {
        Some(reason) => format!("{} - {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    };
    format!(
        "<?xml version=\"1.0\" encoding=\"iso-8859-1\"?>\n\
         <!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\"\n\
         \t\"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd\">\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"en\" lang=\"en\">\n \
         <head>\n  \
         <title>{title}</title>\n \
         </head>\n \
         <body>\n  \
         <h1>{title}</h1>\n \
         </body>\n\
         </html>\n"
    )
}

fn html(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html")],
        body,
    )
        .into_response()
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        let mut response =
            (self.status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response();
        for (name, value) in self.headers {
            if let Ok(value) = HeaderValue::from_str(&value) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(name), value);
            }
        }
        response
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            RouteError::Forced {
                body: Some(body), ..
            } => (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response(),
            _ => html(status, error_page(status)),
        }
    }
}
