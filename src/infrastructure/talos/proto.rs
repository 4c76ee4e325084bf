// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Machine API messages.
//!
//! Only the subset of `machine.proto` and `resource.proto` this crate calls
//! is declared; field tags match the upstream definitions.

pub const APPLY_CONFIGURATION_PATH: &str = "/machine.MachineService/ApplyConfiguration";
pub const BOOTSTRAP_PATH: &str = "/machine.MachineService/Bootstrap";
pub const RESET_PATH: &str = "/machine.MachineService/Reset";
pub const RESOURCE_GET_PATH: &str = "/resource.ResourceService/Get";

// ============================================================================
// Common
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metadata {
    #[prost(string, tag = "1")]
    pub hostname: String,
    #[prost(string, tag = "2")]
    pub error: String,
}

// ============================================================================
// ApplyConfiguration
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ApplyConfigurationMode {
    Reboot = 0,
    Auto = 1,
    NoReboot = 2,
    Staged = 3,
    Try = 4,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApplyConfigurationRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
    #[prost(enumeration = "ApplyConfigurationMode", tag = "4")]
    pub mode: i32,
    #[prost(bool, tag = "5")]
    pub dry_run: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApplyConfiguration {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<Metadata>,
    #[prost(string, repeated, tag = "2")]
    pub warnings: Vec<String>,
    #[prost(enumeration = "ApplyConfigurationMode", tag = "3")]
    pub mode: i32,
    #[prost(string, tag = "4")]
    pub mode_details: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApplyConfigurationResponse {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<ApplyConfiguration>,
}

// ============================================================================
// Bootstrap
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BootstrapRequest {
    #[prost(bool, tag = "1")]
    pub recover_etcd: bool,
    #[prost(bool, tag = "2")]
    pub recover_skip_hash_check: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Bootstrap {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<Metadata>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BootstrapResponse {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Bootstrap>,
}

// ============================================================================
// Reset
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResetRequest {
    #[prost(bool, tag = "1")]
    pub graceful: bool,
    #[prost(bool, tag = "2")]
    pub reboot: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Reset {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<Metadata>,
    #[prost(string, tag = "2")]
    pub actor_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResetResponse {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Reset>,
}

// ============================================================================
// Resource Get
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRequest {
    #[prost(string, tag = "1")]
    pub namespace: String,
    #[prost(string, tag = "2")]
    pub r#type: String,
    #[prost(string, tag = "3")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceMetadata {
    #[prost(string, tag = "1")]
    pub namespace: String,
    #[prost(string, tag = "2")]
    pub r#type: String,
    #[prost(string, tag = "3")]
    pub id: String,
    #[prost(string, tag = "4")]
    pub version: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Spec {
    #[prost(bytes = "vec", tag = "1")]
    pub yaml: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Resource {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<ResourceMetadata>,
    #[prost(message, optional, tag = "2")]
    pub spec: Option<Spec>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Get {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<Metadata>,
    #[prost(message, optional, tag = "2")]
    pub definition: Option<Resource>,
    #[prost(message, optional, tag = "3")]
    pub resource: Option<Resource>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResponse {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Get>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_apply_request_wire_tags() {
        let req = ApplyConfigurationRequest {
            data: b"version: v1alpha1\n".to_vec(),
            mode: ApplyConfigurationMode::Auto as i32,
            dry_run: false,
        };
        let bytes = req.encode_to_vec();
        // field 1, wire type 2 (length-delimited)
        assert_eq!(bytes[0], 0x0a);
        // field 4, wire type 0 (varint) follows the data
        let mode_key = bytes[2 + req.data.len()];
        assert_eq!(mode_key, 0x20);
    }

    #[test]
    fn test_get_response_yaml_extraction() {
        let resp = GetResponse {
            messages: vec![Get {
                metadata: Some(Metadata {
                    hostname: "cp-1".to_string(),
                    error: String::new(),
                }),
                definition: None,
                resource: Some(Resource {
                    metadata: None,
                    spec: Some(Spec {
                        yaml: b"version: v1alpha1\n".to_vec(),
                    }),
                }),
            }],
        };
        let decoded = GetResponse::decode(resp.encode_to_vec().as_slice()).unwrap();
        let yaml = &decoded.messages[0]
            .resource
            .as_ref()
            .unwrap()
            .spec
            .as_ref()
            .unwrap()
            .yaml;
        assert_eq!(yaml.as_slice(), b"version: v1alpha1\n");
    }
}
