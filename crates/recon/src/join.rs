use std::collections::HashMap;

use crate::config::JoinConfig;
use crate::model::{LinkStatus, LinkedRecord, RosterRecord, Student};

/// Left outer join of roster rows (driving side) to classified students.
///
/// Each roster row yields one linked row per student whose order-side key
/// equals the roster key, in student order, or a single `Manual` row when
/// nothing matches. Empty keys never match. Duplicate roster keys are not
/// collapsed, so a repeated key produces one linked row per roster row.
pub fn left_join(
    roster: &[RosterRecord],
    students: &[Student],
    join: &JoinConfig,
) -> Vec<LinkedRecord> {
    let mut by_key: HashMap<&str, Vec<&Student>> = HashMap::new();
    for student in students {
        let key = student.order.field(&join.order_key).trim();
        if !key.is_empty() {
            by_key.entry(key).or_default().push(student);
        }
    }

    let mut joined = Vec::with_capacity(roster.len());
    for record in roster {
        let key = record.field(&join.roster_key).trim();
        match by_key.get(key).filter(|_| !key.is_empty()) {
            Some(matches) => {
                for student in matches {
                    joined.push(LinkedRecord {
                        roster: record.clone(),
                        student: Some((*student).clone()),
                        status: LinkStatus::Matched(student.tier),
                    });
                }
            }
            None => joined.push(LinkedRecord {
                roster: record.clone(),
                student: None,
                status: LinkStatus::Manual,
            }),
        }
    }

    joined
}
