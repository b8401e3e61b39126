// metar_qam - METAR poller that keeps a change history and renders QAM weather bulletins
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};
use std::error;
use std::fmt;

#[derive(Debug)]
pub enum ClientError {
    Internal(reqwest::Error),
    InvalidStation(String),
    Unexpected(StatusCode, Url),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::InvalidStation(s) => write!(f, "invalid station {}", s),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

/// Client for the NOAA station files at `data/observations/metar/stations/{STATION}.TXT`.
#[derive(Debug)]
pub struct NoaaMetarClient {
    client: Client,
    base_url: Url,
}

impl NoaaMetarClient {
    const USER_AGENT: &'static str = "METAR QAM Bulletins (https://github.com/56quarters/metar_qam)";
    const TEXT_RESPONSE: &'static str = "text/plain";

    pub fn new(client: Client, base_url: Url) -> Self {
        NoaaMetarClient { client, base_url }
    }

    /// Fetch the latest raw report for a station, or `None` if the file has no report.
    pub async fn latest_report(&self, station: &str) -> Result<Option<String>, ClientError> {
        let request_url = self.report_url(station);
        tracing::debug!(message = "making latest report request", url = %request_url);

        let res = self.make_request(station, request_url).await?;
        let body = res.text().await.map_err(ClientError::Internal)?;
        Ok(last_line(&body))
    }

    async fn make_request<S: Into<String>>(&self, station: S, url: Url) -> Result<Response, ClientError> {
        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::TEXT_RESPONSE)
            .send()
            .await
            .map_err(ClientError::Internal)?;

        let status = res.status();
        if status == StatusCode::OK {
            Ok(res)
        } else if status == StatusCode::NOT_FOUND {
            Err(ClientError::InvalidStation(station.into()))
        } else {
            Err(ClientError::Unexpected(status, url))
        }
    }

    fn report_url(&self, station: &str) -> Url {
        let encoded_station = utf8_percent_encode(station, NON_ALPHANUMERIC);
        let mut url = self.base_url.clone();
        url.set_path(&format!(
            "{}/data/observations/metar/stations/{}.TXT",
            self.base_url.path().trim_end_matches('/'),
            encoded_station
        ));

        url
    }
}

/// The station file starts with a timestamp line; the report is the last line.
fn last_line(body: &str) -> Option<String> {
    body.trim().lines().last().map(str::trim).filter(|l| !l.is_empty()).map(String::from)
}
