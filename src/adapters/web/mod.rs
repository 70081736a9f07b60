//! Web adapter: warp routes for the upload page.
//!
//! - `GET /` renders the form, showing and clearing any pending flash message
//! - `POST /` reads `med_file` + `key_file`, then either redirects back with a
//!   flash message (invalid upload) or renders the extracted medications

mod flash;
mod page;
mod upload;

use std::convert::Infallible;
use std::sync::Arc;

use warp::http::header::SET_COOKIE;
use warp::http::{StatusCode, Uri};
use warp::multipart::FormData;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::adapters::fernet::FernetCipher;
use crate::application::PrescriptionService;
use crate::config::AppConfig;
use crate::PharmacyError;

pub use flash::{FlashSigner, FLASH_COOKIE};
pub use page::{escape_html, render_index};
pub use upload::{
    allowed_file, PrescriptionUpload, UploadError, UploadForm, ALLOWED_EXTENSIONS, KEY_FIELD,
    MED_FIELD,
};

/// Request-handling state, built once at startup and shared read-only.
#[derive(Clone)]
pub struct AppState {
    service: PrescriptionService<FernetCipher>,
    flash: Arc<FlashSigner>,
    max_upload_bytes: u64,
}

impl AppState {
    /// Build the state from configuration.
    ///
    /// # Errors
    /// Returns error if the flash secret cannot key the signer.
    pub fn new(config: &AppConfig) -> Result<Self, PharmacyError> {
        let cipher = match config.token_ttl {
            Some(ttl) => FernetCipher::with_ttl(ttl),
            None => FernetCipher::new(),
        };
        Ok(Self {
            service: PrescriptionService::new(Arc::new(cipher)),
            flash: Arc::new(FlashSigner::new(&config.secret_key)?),
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

/// All routes, with rejections rendered as HTML status pages.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .and(warp::cookie::optional(FLASH_COOKIE))
        .and(with_state(state.clone()))
        .and_then(handle_index);

    let upload = warp::path::end()
        .and(warp::post())
        .and(warp::body::content_length_limit(state.max_upload_bytes))
        .and(warp::multipart::form().max_length(state.max_upload_bytes))
        .and(with_state(state))
        .and_then(handle_upload);

    index
        .or(upload)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

/// The multipart body could not be parsed.
#[derive(Debug)]
struct MalformedUpload;

impl warp::reject::Reject for MalformedUpload {}

/// Inject the shared state.
fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn handle_index(flash_cookie: Option<String>, state: AppState) -> Result<Response, Rejection> {
    let Some(cookie) = flash_cookie else {
        return Ok(warp::reply::html(render_index(&[], &[])).into_response());
    };

    let messages: Vec<String> = state.flash.verify(&cookie).into_iter().collect();
    if messages.is_empty() {
        tracing::debug!("Ignoring flash cookie with invalid signature");
    }

    let reply = warp::reply::html(render_index(&[], &messages));
    Ok(warp::reply::with_header(reply, SET_COOKIE, FlashSigner::clear_cookie()).into_response())
}

async fn handle_upload(form: FormData, state: AppState) -> Result<Response, Rejection> {
    let form = UploadForm::read(form).await.map_err(|e| {
        tracing::warn!("Failed to read multipart upload: {e}");
        warp::reject::custom(MalformedUpload)
    })?;

    let upload = match form.validate() {
        Ok(upload) => upload,
        Err(e) => {
            tracing::info!("Rejected upload: {e}");
            return Ok(redirect_with_flash(
                &state.flash,
                &PharmacyError::from(e).status_message(),
            ));
        }
    };

    tracing::info!(
        payload_bytes = upload.payload.size_bytes(),
        "Processing prescription upload"
    );

    let page = match state.service.read_prescriptions(&upload.payload, &upload.key) {
        Ok(records) => render_index(&records, &[]),
        Err(e) => render_index(&[], &[e.status_message()]),
    };
    Ok(warp::reply::html(page).into_response())
}

fn redirect_with_flash(flash: &FlashSigner, message: &str) -> Response {
    let redirect = warp::redirect::see_other(Uri::from_static("/"));
    warp::reply::with_header(redirect, SET_COOKIE, flash.set_cookie(message)).into_response()
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Página não encontrada.")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Arquivos grandes demais.")
    } else if err.find::<MalformedUpload>().is_some() {
        (StatusCode::BAD_REQUEST, "Envio de arquivos inválido.")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Método não permitido.")
    } else {
        tracing::warn!("Unhandled rejection: {:?}", err);
        (StatusCode::BAD_REQUEST, "Requisição inválida.")
    };

    let page = warp::reply::html(render_index(&[], &[message.to_string()]));
    Ok(warp::reply::with_status(page, status).into_response())
}
