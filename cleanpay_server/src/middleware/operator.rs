//! Operator access middleware for the CleanPay server.
//!
//! Guards the `/api` scope. Requests must carry the operator bearer token in the
//! `Authorization` header; anything else gets a 401 before reaching a handler. An empty
//! configured token locks the scope entirely.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use cleanpay_common::Secret;
use futures::{
    future::{ok, Ready},
    Future,
};
use log::warn;

use crate::errors::ServerError;

pub struct OperatorMiddlewareFactory {
    token: Secret<String>,
}

impl OperatorMiddlewareFactory {
    pub fn new(token: Secret<String>) -> Self {
        OperatorMiddlewareFactory { token }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OperatorMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = OperatorMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(OperatorMiddlewareService { token: self.token.clone(), service: Rc::new(service) })
    }
}

pub struct OperatorMiddlewareService<S> {
    token: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for OperatorMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let token = self.token.clone();
        Box::pin(async move {
            let supplied = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim);
            let expected = token.reveal().as_str();
            let authorized = !expected.is_empty() && supplied == Some(expected);
            if authorized {
                service.call(req).await
            } else {
                warn!("💻️ Rejected operator request to {} with a missing or invalid token", req.path());
                Err(ServerError::Unauthorized.into())
            }
        })
    }
}
