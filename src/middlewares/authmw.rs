use std::future::{Ready, ready};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    error::ErrorUnauthorized,
    http::header,
};
use futures_util::future::LocalBoxFuture;

use crate::models::role::Role;
use crate::utils::jwt::{Claims, validate_token};

pub struct JwtAuth;

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddleware { service }))
    }
}

pub struct JwtAuthMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Scan-facing routes stay open: anyone pointing a camera at a code
        // must be able to hit them.
        let path = req.path();
        if path.starts_with("/api/auth/")
            || path.starts_with("/track/")
            || path.starts_with("/api/analytics/verify-password/")
            || path.starts_with("/api/health/check")
        {
            return Box::pin(self.service.call(req));
        }

        let auth_header = match req.headers().get(header::AUTHORIZATION) {
            Some(header) => header,
            None => {
                return Box::pin(async move { Err(ErrorUnauthorized("No authorization header")) });
            }
        };

        let auth_header_str = match auth_header.to_str() {
            Ok(header_str) => header_str,
            Err(_) => {
                return Box::pin(
                    async move { Err(ErrorUnauthorized("Invalid authorization header")) },
                );
            }
        };

        let token = match auth_header_str.strip_prefix("Bearer ") {
            Some(token) => token,
            None => {
                return Box::pin(
                    async move { Err(ErrorUnauthorized("Invalid authorization format")) },
                );
            }
        };

        let claims = match validate_token(token) {
            Ok(claims) => claims,
            Err(_) => {
                return Box::pin(async move { Err(ErrorUnauthorized("Invalid token")) });
            }
        };

        // Handlers and downstream middlewares read the claims from here.
        req.extensions_mut().insert::<Claims>(claims);

        Box::pin(self.service.call(req))
    }
}

/// Restricts a scope to callers holding one of the listed roles.
pub struct RequireRoles(pub Vec<Role>);

impl<S, B> Transform<S, ServiceRequest> for RequireRoles
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequireRolesMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireRolesMiddleware {
            service,
            required_roles: self.0.clone(),
        }))
    }
}

pub struct RequireRolesMiddleware<S> {
    service: S,
    required_roles: Vec<Role>,
}

impl<S, B> Service<ServiceRequest> for RequireRolesMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let user_roles = req
            .extensions()
            .get::<Claims>()
            .map(|claims| claims.roles.clone());

        let user_roles = match user_roles {
            Some(roles) => roles,
            None => {
                return Box::pin(async move { Err(ErrorUnauthorized("Authentication required")) });
            }
        };

        let has_required_role = user_roles.iter().any(|role| {
            // SuperUser passes every gate.
            role.is_superuser() || self.required_roles.contains(role)
        });

        if !has_required_role {
            return Box::pin(async move { Err(ErrorUnauthorized("Insufficient permissions")) });
        }

        Box::pin(self.service.call(req))
    }
}
