use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::Arc;
use tracing::warn;

use super::request::to_http_request;
use super::response::{write_response, MaySink};
use crate::dispatcher::{Dispatcher, HandlerResponse};

/// `may_minihttp` service handing every request to the [`Dispatcher`]
///
/// Cloned once per connection; all clones share the dispatcher.
#[derive(Clone)]
pub struct AppService {
    dispatcher: Arc<Dispatcher>,
}

impl AppService {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let request = match to_http_request(req) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Malformed request rejected");
                write_response(
                    res,
                    HandlerResponse::text(http::StatusCode::BAD_REQUEST, "Bad Request"),
                );
                return Ok(());
            }
        };
        // may_minihttp does not expose the peer address
        self.dispatcher.serve(request, None, &mut MaySink(res))
    }
}
