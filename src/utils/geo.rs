use actix_web::HttpRequest;

/// Client location as resolved by the reverse proxy / CDN in front of the
/// service. The lookup itself happens there; we only read the headers it
/// injects and fall back to unknown when they are absent.
#[derive(Debug, Clone, Default)]
pub struct GeoLocation {
    pub country: Option<String>,
    pub city: Option<String>,
}

pub fn locate(req: &HttpRequest) -> GeoLocation {
    GeoLocation {
        country: header_value(req, "cf-ipcountry")
            .or_else(|| header_value(req, "x-geo-country")),
        city: header_value(req, "x-geo-city"),
    }
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
}
