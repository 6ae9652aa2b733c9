//! Access control list middleware for the TrustChain server.
//! This middleware can be placed on any route or service.
//!
//! It reads the caller's identity from the request headers and checks the caller's role against the roles allowed on
//! the route. An empty list admits any identified caller. If the check passes, the identity is stored in the request
//! extensions for the handler, and the request continues. Otherwise a 401 (no identity) or 403 (wrong role) response
//! is returned.
use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;
use trustchain_engine::db_types::Role;

use crate::{config::ServerOptions, errors::ServerError, helpers::get_remote_ip, identity::Identity};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AclMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let identity = Identity::from_headers(req.headers())?;
            if !identity.has_any_role(&allowed_roles) {
                let options = req.app_data::<web::Data<ServerOptions>>().map(|o| ***o).unwrap_or_default();
                let remote = get_remote_ip(req.request(), options).map(|ip| ip.to_string()).unwrap_or_default();
                warn!("💻️ {} ({}) from [{remote}] may not call {}", identity.user_id, identity.role, req.path());
                let allowed = allowed_roles.iter().map(Role::as_str).collect::<Vec<_>>().join(" or ");
                return Err(ServerError::InsufficientPermissions(format!("This route requires the {allowed} role"))
                    .into());
            }
            trace!("💻️ {} ({}) admitted to {}", identity.user_id, identity.role, req.path());
            req.extensions_mut().insert(identity);
            service.call(req).await
        })
    }
}
