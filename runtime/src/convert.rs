//! Conversions between control-plane and engine breakpoint records.

use std::time::SystemTime;

use debuglet_core::v2;
use debuglet_core::v2::status_message::Reference;
use debuglet_core::wire;

/// Deepest variable level copied into a control-plane record. Members
/// below it are dropped and the truncated variable carries a status.
pub const MAX_VARIABLE_DEPTH: usize = 16;

/// Control-plane breakpoint -> engine record.
pub fn to_wire_breakpoint(breakpoint: &v2::Breakpoint) -> wire::Breakpoint {
    let mut converted = wire::Breakpoint {
        id: breakpoint.id.clone(),
        location: breakpoint
            .location
            .as_ref()
            .map(|location| wire::SourceLocation {
                path: location.path.clone(),
                line: location.line,
            }),
        activated: true,
        condition: breakpoint.condition.clone(),
        expressions: breakpoint.expressions.clone(),
        log_point: breakpoint.action() == v2::breakpoint::Action::Log,
        log_message_format: breakpoint.log_message_format.clone(),
        create_time: breakpoint.create_time.clone(),
        ..Default::default()
    };
    converted.set_log_level(match breakpoint.log_level() {
        v2::breakpoint::LogLevel::Info => wire::LogLevel::Info,
        v2::breakpoint::LogLevel::Warning => wire::LogLevel::Warning,
        v2::breakpoint::LogLevel::Error => wire::LogLevel::Error,
    });
    converted
}

pub fn to_wire_breakpoints(breakpoints: &[v2::Breakpoint]) -> Vec<wire::Breakpoint> {
    breakpoints.iter().map(to_wire_breakpoint).collect()
}

/// Engine record -> control-plane breakpoint, including captured state.
pub fn to_v2_breakpoint(breakpoint: &wire::Breakpoint) -> v2::Breakpoint {
    let mut converted = v2::Breakpoint {
        id: breakpoint.id.clone(),
        location: breakpoint.location.as_ref().map(to_v2_location),
        condition: breakpoint.condition.clone(),
        expressions: breakpoint.expressions.clone(),
        log_message_format: breakpoint.log_message_format.clone(),
        is_final_state: breakpoint.is_final,
        create_time: breakpoint.create_time.clone(),
        final_time: breakpoint.finalize_time.clone(),
        status: breakpoint.status.as_ref().map(|status| {
            let refers_to = if status.is_error {
                Reference::BreakpointSourceLocation
            } else {
                Reference::Unspecified
            };
            v2::StatusMessage::new(status.is_error, refers_to, status.message.clone())
        }),
        stack_frames: breakpoint.stack_frames.iter().map(to_v2_stack_frame).collect(),
        evaluated_expressions: breakpoint
            .evaluated_expressions
            .iter()
            .map(|v| to_v2_variable(v, 1))
            .collect(),
        ..Default::default()
    };
    converted.set_action(if breakpoint.log_point {
        v2::breakpoint::Action::Log
    } else {
        v2::breakpoint::Action::Capture
    });
    converted.set_log_level(match breakpoint.log_level() {
        wire::LogLevel::Info => v2::breakpoint::LogLevel::Info,
        wire::LogLevel::Warning => v2::breakpoint::LogLevel::Warning,
        wire::LogLevel::Error => v2::breakpoint::LogLevel::Error,
    });
    converted
}

/// Mark a breakpoint as final, stamping the finalize time if absent.
pub fn finalize(breakpoint: &mut v2::Breakpoint) {
    breakpoint.is_final_state = true;
    if breakpoint.final_time.is_none() {
        breakpoint.final_time = Some(prost_types::Timestamp::from(SystemTime::now()));
    }
}

fn to_v2_location(location: &wire::SourceLocation) -> v2::SourceLocation {
    v2::SourceLocation {
        path: location.path.clone(),
        line: location.line,
        column: 0,
    }
}

fn to_v2_stack_frame(frame: &wire::StackFrame) -> v2::StackFrame {
    v2::StackFrame {
        function: frame.method_name.clone(),
        location: frame.location.as_ref().map(to_v2_location),
        arguments: frame.arguments.iter().map(|v| to_v2_variable(v, 1)).collect(),
        locals: frame.locals.iter().map(|v| to_v2_variable(v, 1)).collect(),
    }
}

fn to_v2_variable(variable: &wire::Variable, depth: usize) -> v2::Variable {
    let mut converted = v2::Variable {
        name: variable.name.clone(),
        value: variable.value.clone(),
        r#type: variable.r#type.clone(),
        status: variable.status.as_ref().map(|status| {
            v2::StatusMessage::new(status.is_error, Reference::VariableValue, status.message.clone())
        }),
        ..Default::default()
    };

    if depth >= MAX_VARIABLE_DEPTH {
        if !variable.members.is_empty() {
            converted.status = Some(v2::StatusMessage::new(
                false,
                Reference::VariableValue,
                format!("Members below depth {} were omitted", MAX_VARIABLE_DEPTH),
            ));
        }
        return converted;
    }

    converted.members = variable
        .members
        .iter()
        .map(|member| to_v2_variable(member, depth + 1))
        .collect();
    converted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(depth: usize) -> wire::Variable {
        let mut variable = wire::Variable {
            name: format!("level{}", depth),
            value: depth.to_string(),
            ..Default::default()
        };
        for level in (1..depth).rev() {
            variable = wire::Variable {
                name: format!("level{}", level),
                members: vec![variable],
                ..Default::default()
            };
        }
        variable
    }

    fn depth_of(variable: &v2::Variable) -> usize {
        1 + variable.members.iter().map(depth_of).max().unwrap_or(0)
    }

    #[test]
    fn test_control_plane_breakpoint_to_wire() {
        let mut source = v2::Breakpoint {
            id: "bp-1".to_string(),
            location: Some(v2::SourceLocation {
                path: "Program.cs".to_string(),
                line: 27,
                column: 4,
            }),
            condition: "count > 2".to_string(),
            expressions: vec!["count".to_string()],
            ..Default::default()
        };
        source.set_log_level(v2::breakpoint::LogLevel::Warning);

        let converted = to_wire_breakpoint(&source);
        assert_eq!(converted.id, "bp-1");
        assert!(converted.activated);
        assert!(!converted.log_point);
        assert_eq!(converted.location.as_ref().unwrap().line, 27);
        assert_eq!(converted.condition, "count > 2");
        assert_eq!(converted.expressions, vec!["count"]);
        assert_eq!(converted.log_level(), wire::LogLevel::Warning);
    }

    #[test]
    fn test_log_action_becomes_log_point() {
        let mut source = v2::Breakpoint {
            id: "lp-1".to_string(),
            log_message_format: "user $0".to_string(),
            ..Default::default()
        };
        source.set_action(v2::breakpoint::Action::Log);

        let converted = to_wire_breakpoint(&source);
        assert!(converted.log_point);
        assert_eq!(converted.log_message_format, "user $0");

        let back = to_v2_breakpoint(&converted);
        assert_eq!(back.action(), v2::breakpoint::Action::Log);
    }

    #[test]
    fn test_hit_breakpoint_to_control_plane() {
        let mut hit = wire::Breakpoint::at("bp-3", "Api.cs", 55);
        hit.is_final = true;
        hit.status = Some(wire::Status {
            is_error: true,
            message: "Condition could not be evaluated".to_string(),
        });
        hit.stack_frames.push(wire::StackFrame {
            method_name: "Api.Handle".to_string(),
            location: hit.location.clone(),
            arguments: vec![wire::Variable {
                name: "request".to_string(),
                value: "{...}".to_string(),
                r#type: "Request".to_string(),
                ..Default::default()
            }],
            locals: vec![nested(3)],
        });
        hit.evaluated_expressions.push(wire::Variable {
            name: "request.Id".to_string(),
            value: "12".to_string(),
            ..Default::default()
        });

        let converted = to_v2_breakpoint(&hit);
        assert!(converted.is_final_state);
        assert_eq!(converted.action(), v2::breakpoint::Action::Capture);
        let status = converted.status.as_ref().unwrap();
        assert!(status.is_error);
        assert_eq!(
            status.description.as_ref().unwrap().format,
            "Condition could not be evaluated"
        );

        let frame = &converted.stack_frames[0];
        assert_eq!(frame.function, "Api.Handle");
        assert_eq!(frame.location.as_ref().unwrap().line, 55);
        assert_eq!(frame.arguments[0].r#type, "Request");
        assert_eq!(depth_of(&frame.locals[0]), 3);
        assert_eq!(converted.evaluated_expressions[0].value, "12");
    }

    #[test]
    fn test_variable_depth_is_capped() {
        let mut hit = wire::Breakpoint::at("bp-deep", "Tree.cs", 1);
        hit.evaluated_expressions.push(nested(MAX_VARIABLE_DEPTH + 25));

        let converted = to_v2_breakpoint(&hit);
        let root = &converted.evaluated_expressions[0];
        assert_eq!(depth_of(root), MAX_VARIABLE_DEPTH);

        let mut deepest = root;
        while let Some(child) = deepest.members.first() {
            deepest = child;
        }
        let status = deepest.status.as_ref().unwrap();
        assert!(!status.is_error);
        assert_eq!(status.refers_to(), Reference::VariableValue);
    }

    #[test]
    fn test_shallow_variable_keeps_leaf_status() {
        let variable = wire::Variable {
            name: "x".to_string(),
            status: Some(wire::Status {
                is_error: true,
                message: "Value unavailable".to_string(),
            }),
            ..Default::default()
        };
        let converted = to_v2_variable(&variable, 1);
        assert!(converted.status.unwrap().is_error);
    }

    #[test]
    fn test_finalize_stamps_time_once() {
        let mut breakpoint = v2::Breakpoint::default();
        finalize(&mut breakpoint);
        assert!(breakpoint.is_final_state);
        let stamped = breakpoint.final_time.clone();
        assert!(stamped.is_some());

        finalize(&mut breakpoint);
        assert_eq!(breakpoint.final_time, stamped);
    }
}
