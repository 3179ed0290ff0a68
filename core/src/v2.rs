//! Control-plane records.
//!
//! The subset of the `google.devtools.clouddebugger.v2` data model used by the
//! three controller RPCs the agent issues. Field tags follow the published
//! protos so these messages are wire compatible with the service.

/// Fully qualified gRPC service name of the controller API.
pub const CONTROLLER_SERVICE: &str = "google.devtools.clouddebugger.v2.Controller2";

/// Wait token sent on the first long-poll after (re-)registration.
pub const INITIAL_WAIT_TOKEN: &str = "init";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FormatMessage {
    #[prost(string, tag = "1")]
    pub format: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub parameters: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatusMessage {
    #[prost(bool, tag = "1")]
    pub is_error: bool,
    #[prost(enumeration = "status_message::Reference", tag = "2")]
    pub refers_to: i32,
    #[prost(message, optional, tag = "3")]
    pub description: ::core::option::Option<FormatMessage>,
}

pub mod status_message {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Reference {
        Unspecified = 0,
        BreakpointSourceLocation = 3,
        BreakpointCondition = 4,
        BreakpointExpression = 7,
        BreakpointAge = 8,
        VariableName = 5,
        VariableValue = 6,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SourceLocation {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub line: i32,
    #[prost(int32, tag = "3")]
    pub column: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Variable {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub value: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub r#type: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "3")]
    pub members: ::prost::alloc::vec::Vec<Variable>,
    #[prost(message, optional, tag = "5")]
    pub status: ::core::option::Option<StatusMessage>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StackFrame {
    #[prost(string, tag = "1")]
    pub function: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub location: ::core::option::Option<SourceLocation>,
    #[prost(message, repeated, tag = "3")]
    pub arguments: ::prost::alloc::vec::Vec<Variable>,
    #[prost(message, repeated, tag = "4")]
    pub locals: ::prost::alloc::vec::Vec<Variable>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Breakpoint {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(enumeration = "breakpoint::Action", tag = "13")]
    pub action: i32,
    #[prost(message, optional, tag = "2")]
    pub location: ::core::option::Option<SourceLocation>,
    #[prost(string, tag = "3")]
    pub condition: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "4")]
    pub expressions: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "14")]
    pub log_message_format: ::prost::alloc::string::String,
    #[prost(enumeration = "breakpoint::LogLevel", tag = "15")]
    pub log_level: i32,
    #[prost(bool, tag = "5")]
    pub is_final_state: bool,
    #[prost(message, optional, tag = "11")]
    pub create_time: ::core::option::Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "12")]
    pub final_time: ::core::option::Option<::prost_types::Timestamp>,
    #[prost(string, tag = "16")]
    pub user_email: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "10")]
    pub status: ::core::option::Option<StatusMessage>,
    #[prost(message, repeated, tag = "7")]
    pub stack_frames: ::prost::alloc::vec::Vec<StackFrame>,
    #[prost(message, repeated, tag = "8")]
    pub evaluated_expressions: ::prost::alloc::vec::Vec<Variable>,
    #[prost(message, repeated, tag = "9")]
    pub variable_table: ::prost::alloc::vec::Vec<Variable>,
    #[prost(map = "string, string", tag = "17")]
    pub labels: ::std::collections::HashMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
}

pub mod breakpoint {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Action {
        Capture = 0,
        Log = 1,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum LogLevel {
        Info = 0,
        Warning = 1,
        Error = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GitSourceContext {
    #[prost(string, tag = "1")]
    pub url: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub revision_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SourceContext {
    #[prost(oneof = "source_context::Context", tags = "6")]
    pub context: ::core::option::Option<source_context::Context>,
}

pub mod source_context {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Context {
        #[prost(message, tag = "6")]
        Git(super::GitSourceContext),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Debuggee {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub project: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub uniquifier: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub description: ::prost::alloc::string::String,
    #[prost(bool, tag = "5")]
    pub is_inactive: bool,
    #[prost(string, tag = "6")]
    pub agent_version: ::prost::alloc::string::String,
    #[prost(bool, tag = "7")]
    pub is_disabled: bool,
    #[prost(message, optional, tag = "8")]
    pub status: ::core::option::Option<StatusMessage>,
    #[prost(message, repeated, tag = "9")]
    pub source_contexts: ::prost::alloc::vec::Vec<SourceContext>,
    #[prost(map = "string, string", tag = "11")]
    pub labels: ::std::collections::HashMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterDebuggeeRequest {
    #[prost(message, optional, tag = "1")]
    pub debuggee: ::core::option::Option<Debuggee>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterDebuggeeResponse {
    #[prost(message, optional, tag = "1")]
    pub debuggee: ::core::option::Option<Debuggee>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListActiveBreakpointsRequest {
    #[prost(string, tag = "1")]
    pub debuggee_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub wait_token: ::prost::alloc::string::String,
    #[prost(bool, tag = "3")]
    pub success_on_timeout: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListActiveBreakpointsResponse {
    #[prost(message, repeated, tag = "1")]
    pub breakpoints: ::prost::alloc::vec::Vec<Breakpoint>,
    #[prost(string, tag = "2")]
    pub next_wait_token: ::prost::alloc::string::String,
    /// Set when the long poll timed out without changes; the list is empty
    /// and must not be read as "everything was deleted".
    #[prost(bool, tag = "3")]
    pub wait_expired: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateActiveBreakpointRequest {
    #[prost(string, tag = "1")]
    pub debuggee_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub breakpoint: ::core::option::Option<Breakpoint>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateActiveBreakpointResponse {}

impl StatusMessage {
    /// Build a status with a plain description.
    pub fn new(
        is_error: bool,
        refers_to: status_message::Reference,
        format: impl Into<String>,
    ) -> Self {
        Self {
            is_error,
            refers_to: refers_to as i32,
            description: Some(FormatMessage {
                format: format.into(),
                parameters: vec![],
            }),
        }
    }
}
