//! Thin HTTP wrapper: the target host is checked against the plugin's
//! `net` permission before the request is dispatched, and automatic
//! redirects outside the allow set are not followed.

use crate::error::{FacadeError, FacadeResult};
use pcore_permissions::{check_net, normalize_host};
use pcore_protocol::NetPermission;
use reqwest::blocking::{Client, Response};

pub struct HttpClient {
    permission: NetPermission,
    client: Client,
}

impl HttpClient {
    pub fn new(permission: NetPermission) -> Self {
        Self {
            permission,
            client: Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .expect("reqwest client with disabled redirects must build"),
        }
    }

    fn host_of(url: &str) -> Option<String> {
        url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string))
    }

    fn check_host(&self, url: &str) -> FacadeResult<()> {
        let host = Self::host_of(url).unwrap_or_else(|| normalize_host(url));
        let decision = check_net(&self.permission, &host);
        if decision.granted {
            Ok(())
        } else {
            Err(FacadeError::NetDenied(host))
        }
    }

    pub fn get(&self, url: &str) -> FacadeResult<Response> {
        self.check_host(url)?;
        Ok(self.client.get(url).send()?)
    }

    pub fn post_json(&self, url: &str, body: &serde_json::Value) -> FacadeResult<Response> {
        self.check_host(url)?;
        Ok(self.client.post(url).json(body).send()?)
    }
}
