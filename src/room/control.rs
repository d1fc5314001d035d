//! HTTP control plane for the room service.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{RoomControl, RoomError};

/// Seconds of media per recording segment.
const SEGMENT_DURATION_SECS: u32 = 10;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EncodingPreset {
    #[serde(rename = "H264_720P_30")]
    H264_720p30,
    #[serde(rename = "H264_1080P_30")]
    H264_1080p30,
}

/// S3-compatible upload target for recording segments.
#[derive(Debug, Clone, Serialize)]
pub struct S3Upload {
    pub access_key: String,
    pub secret: String,
    pub region: String,
    pub endpoint: String,
    pub force_path_style: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentedFileOutput {
    pub filename_prefix: String,
    pub playlist_name: String,
    pub live_playlist_name: String,
    pub segment_duration: u32,
    pub s3: S3Upload,
}

/// Room-composite recording request.
#[derive(Debug, Clone, Serialize)]
pub struct EgressRequest {
    pub room_name: String,
    pub layout: String,
    pub preset: EncodingPreset,
    pub audio_only: bool,
    pub segment_outputs: Vec<SegmentedFileOutput>,
}

impl EgressRequest {
    /// Speaker-layout composite recording, segmented to the given storage
    /// prefix with a playlist and a live playlist.
    pub fn room_composite(room: &str, filename_prefix: String, s3: S3Upload) -> Self {
        Self {
            room_name: room.to_string(),
            layout: "speaker".to_string(),
            preset: EncodingPreset::H264_720p30,
            audio_only: false,
            segment_outputs: vec![SegmentedFileOutput {
                filename_prefix,
                playlist_name: "playlist.m3u8".to_string(),
                live_playlist_name: "live-playlist.m3u8".to_string(),
                segment_duration: SEGMENT_DURATION_SECS,
                s3,
            }],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EgressInfo {
    pub egress_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteRoomRequest<'a> {
    room: &'a str,
}

pub struct RoomControlClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RoomControlClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, RoomError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RoomError::Service { status, body });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl RoomControl for RoomControlClient {
    async fn delete_room(&self, room: &str) -> Result<(), RoomError> {
        let _: serde_json::Value = self
            .post("/v1/rooms/delete", &DeleteRoomRequest { room })
            .await?;
        info!(room, "room deleted");
        Ok(())
    }

    async fn start_room_composite_egress(
        &self,
        req: &EgressRequest,
    ) -> Result<EgressInfo, RoomError> {
        let egress: EgressInfo = self.post("/v1/egress/room-composite", req).await?;
        info!(
            room = %req.room_name,
            egress_id = %egress.egress_id,
            "recording started"
        );
        Ok(egress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn egress_request_serializes_with_preset_and_segments() {
        let req = EgressRequest::room_composite(
            "interview-42",
            "interview-42/abcd/".to_string(),
            S3Upload {
                access_key: "ak".to_string(),
                secret: "sk".to_string(),
                region: "us-east-1".to_string(),
                endpoint: "https://s3.example.com".to_string(),
                force_path_style: true,
            },
        );

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["room_name"], "interview-42");
        assert_eq!(json["layout"], "speaker");
        assert_eq!(json["preset"], "H264_720P_30");
        assert_eq!(json["audio_only"], false);

        let output = &json["segment_outputs"][0];
        assert_eq!(output["filename_prefix"], "interview-42/abcd/");
        assert_eq!(output["playlist_name"], "playlist.m3u8");
        assert_eq!(output["live_playlist_name"], "live-playlist.m3u8");
        assert_eq!(output["segment_duration"], 10);
        assert_eq!(output["s3"]["force_path_style"], true);
    }
}
