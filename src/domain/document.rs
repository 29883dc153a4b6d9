//! Working-paper document shapes, computed-field resolution, and the
//! period-to-period reset transforms.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored documents are stamped with this version; roll-forward re-stamps
/// copies so older instances upgrade as they move into a new period.
pub const DOC_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
/// The closed set of working-paper document kinds.
pub enum ScheduleDoc {
    LineItemSchedule(LineItemSchedule),
    SimpleSchedule(SimpleSchedule),
    Checklist(Checklist),
    Materiality(Materiality),
}

impl ScheduleDoc {
    /// Short wire-format label for the document kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ScheduleDoc::LineItemSchedule(_) => "LINE_ITEM_SCHEDULE",
            ScheduleDoc::SimpleSchedule(_) => "SIMPLE_SCHEDULE",
            ScheduleDoc::Checklist(_) => "CHECKLIST",
            ScheduleDoc::Materiality(_) => "MATERIALITY",
        }
    }

    /// Derives the copy written into the next period. Row and line identity
    /// survive; user-entered values, responses, and generated content do not.
    pub fn rolled_forward(&self) -> ScheduleDoc {
        match self {
            ScheduleDoc::LineItemSchedule(schedule) => {
                ScheduleDoc::LineItemSchedule(LineItemSchedule {
                    title: schedule.title.clone(),
                    rows: schedule
                        .rows
                        .iter()
                        .map(|row| LineItemRow {
                            id: row.id.clone(),
                            name: row.name.clone(),
                            description: None,
                            current: None,
                            prior: None,
                        })
                        .collect(),
                })
            }
            ScheduleDoc::SimpleSchedule(schedule) => {
                ScheduleDoc::SimpleSchedule(SimpleSchedule {
                    attachments: schedule
                        .attachments
                        .iter()
                        .map(|attachment| Attachment {
                            id: attachment.id.clone(),
                            name: attachment.name.clone(),
                            url: None,
                        })
                        .collect(),
                    sections: schedule
                        .sections
                        .iter()
                        .map(|section| Section {
                            title: section.title.clone(),
                            // previously captured notes become empty, not removed
                            notes: section.notes.as_ref().map(|_| String::new()),
                            lines: section.lines.iter().map(ScheduleLine::rolled_forward).collect(),
                        })
                        .collect(),
                })
            }
            ScheduleDoc::Checklist(checklist) => ScheduleDoc::Checklist(Checklist {
                rows: checklist
                    .rows
                    .iter()
                    .map(|row| ChecklistRow {
                        id: row.id.clone(),
                        text: row.text.clone(),
                        response: None,
                    })
                    .collect(),
            }),
            ScheduleDoc::Materiality(_) => ScheduleDoc::Materiality(Materiality {
                generated_markdown: String::new(),
                generated_at: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Schedule made of flat rows with current- and prior-period amounts.
pub struct LineItemSchedule {
    pub title: String,
    pub rows: Vec<LineItemRow>,
}

impl LineItemSchedule {
    pub fn row_mut(&mut self, row_id: &str) -> Option<&mut LineItemRow> {
        self.rows.iter_mut().find(|row| row.id == row_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItemRow {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Sectioned schedule whose `Total`/`Calc` lines are computed on read from
/// the persisted `Input` amounts.
pub struct SimpleSchedule {
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub lines: Vec<ScheduleLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
/// One line of a [`SimpleSchedule`] section.
pub enum ScheduleLine {
    /// User-entered leaf value.
    Input {
        id: String,
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<f64>,
    },
    /// Sum of the named lines, `None` treated as zero.
    Total {
        id: String,
        label: String,
        sum_of: Vec<String>,
    },
    /// Signed sum across two id lists, `None` treated as zero.
    Calc {
        id: String,
        label: String,
        add: Vec<String>,
        subtract: Vec<String>,
    },
}

impl ScheduleLine {
    pub fn id(&self) -> &str {
        match self {
            ScheduleLine::Input { id, .. }
            | ScheduleLine::Total { id, .. }
            | ScheduleLine::Calc { id, .. } => id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ScheduleLine::Input { label, .. }
            | ScheduleLine::Total { label, .. }
            | ScheduleLine::Calc { label, .. } => label,
        }
    }

    fn rolled_forward(&self) -> ScheduleLine {
        match self {
            ScheduleLine::Input { id, label, .. } => ScheduleLine::Input {
                id: id.clone(),
                label: label.clone(),
                amount: None,
            },
            other => other.clone(),
        }
    }
}

impl SimpleSchedule {
    /// Finds a line anywhere in the document by id.
    pub fn line(&self, line_id: &str) -> Option<&ScheduleLine> {
        self.sections
            .iter()
            .flat_map(|section| &section.lines)
            .find(|line| line.id() == line_id)
    }

    /// Sets the amount of an `Input` line, returning false when no such
    /// input line exists.
    pub fn set_amount(&mut self, line_id: &str, amount: Option<f64>) -> bool {
        for section in &mut self.sections {
            for line in &mut section.lines {
                if let ScheduleLine::Input { id, amount: slot, .. } = line {
                    if id == line_id {
                        *slot = amount;
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Computes the value of every `Total` and `Calc` line.
    ///
    /// References resolve by id across the whole document. Unresolvable ids,
    /// blank inputs, and reference cycles all contribute zero; schedules are
    /// user data and may be transiently inconsistent.
    pub fn computed_values(&self) -> BTreeMap<String, f64> {
        let mut memo = HashMap::new();
        let mut values = BTreeMap::new();
        for line in self.sections.iter().flat_map(|section| &section.lines) {
            if matches!(line, ScheduleLine::Input { .. }) {
                continue;
            }
            let mut visiting = HashSet::new();
            let value = self.resolve(line.id(), &mut memo, &mut visiting);
            values.insert(line.id().to_string(), value);
        }
        values
    }

    fn resolve(
        &self,
        line_id: &str,
        memo: &mut HashMap<String, f64>,
        visiting: &mut HashSet<String>,
    ) -> f64 {
        if let Some(value) = memo.get(line_id) {
            return *value;
        }
        if !visiting.insert(line_id.to_string()) {
            // cycle: the node is still being resolved, treat it as zero
            return 0.0;
        }
        let value = match self.line(line_id) {
            None => 0.0,
            Some(ScheduleLine::Input { amount, .. }) => amount.unwrap_or(0.0),
            Some(ScheduleLine::Total { sum_of, .. }) => sum_of
                .iter()
                .map(|reference| self.resolve(reference, memo, visiting))
                .sum(),
            Some(ScheduleLine::Calc { add, subtract, .. }) => {
                let added: f64 = add
                    .iter()
                    .map(|reference| self.resolve(reference, memo, visiting))
                    .sum();
                let subtracted: f64 = subtract
                    .iter()
                    .map(|reference| self.resolve(reference, memo, visiting))
                    .sum();
                added - subtracted
            }
        };
        visiting.remove(line_id);
        memo.insert(line_id.to_string(), value);
        value
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Yes/not-applicable procedure checklist.
pub struct Checklist {
    pub rows: Vec<ChecklistRow>,
}

impl Checklist {
    /// Records a response for a row, returning false for an unknown row id.
    pub fn set_response(&mut self, row_id: &str, response: Option<ChecklistResponse>) -> bool {
        match self.rows.iter_mut().find(|row| row.id == row_id) {
            Some(row) => {
                row.response = response;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistRow {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ChecklistResponse>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChecklistResponse {
    Agreed,
    #[serde(rename = "NA")]
    NotApplicable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Generated materiality memo; content is produced per period, never carried.
pub struct Materiality {
    #[serde(default)]
    pub generated_markdown: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: &str, amount: Option<f64>) -> ScheduleLine {
        ScheduleLine::Input {
            id: id.into(),
            label: id.to_uppercase(),
            amount,
        }
    }

    fn schedule(sections: Vec<Section>) -> SimpleSchedule {
        SimpleSchedule {
            attachments: Vec::new(),
            sections,
        }
    }

    fn section(title: &str, lines: Vec<ScheduleLine>) -> Section {
        Section {
            title: title.into(),
            notes: None,
            lines,
        }
    }

    #[test]
    fn total_treats_blank_inputs_as_zero() {
        let doc = schedule(vec![section(
            "Accruals",
            vec![
                input("a", Some(10.0)),
                input("b", None),
                ScheduleLine::Total {
                    id: "t".into(),
                    label: "Total".into(),
                    sum_of: vec!["a".into(), "b".into()],
                },
            ],
        )]);
        assert_eq!(doc.computed_values().get("t"), Some(&10.0));
    }

    #[test]
    fn calc_subtracts_blank_as_zero() {
        let doc = schedule(vec![section(
            "Movements",
            vec![
                input("a", Some(10.0)),
                input("b", None),
                ScheduleLine::Calc {
                    id: "c".into(),
                    label: "Net".into(),
                    add: vec!["a".into()],
                    subtract: vec!["b".into()],
                },
            ],
        )]);
        assert_eq!(doc.computed_values().get("c"), Some(&10.0));
    }

    #[test]
    fn references_resolve_across_sections() {
        let doc = schedule(vec![
            section("One", vec![input("a", Some(4.0))]),
            section(
                "Two",
                vec![
                    input("b", Some(6.0)),
                    ScheduleLine::Total {
                        id: "t".into(),
                        label: "Both".into(),
                        sum_of: vec!["a".into(), "b".into()],
                    },
                ],
            ),
        ]);
        assert_eq!(doc.computed_values().get("t"), Some(&10.0));
    }

    #[test]
    fn multi_hop_chains_and_forward_references_resolve() {
        // `net` is declared before the total it references
        let doc = schedule(vec![section(
            "Chain",
            vec![
                ScheduleLine::Calc {
                    id: "net".into(),
                    label: "Net".into(),
                    add: vec!["t".into()],
                    subtract: vec!["b".into()],
                },
                input("a", Some(7.0)),
                input("b", Some(2.0)),
                ScheduleLine::Total {
                    id: "t".into(),
                    label: "Total".into(),
                    sum_of: vec!["a".into(), "b".into()],
                },
            ],
        )]);
        let values = doc.computed_values();
        assert_eq!(values.get("t"), Some(&9.0));
        assert_eq!(values.get("net"), Some(&7.0));
    }

    #[test]
    fn direct_cycle_evaluates_to_zero() {
        let doc = schedule(vec![section(
            "Loop",
            vec![
                input("a", Some(3.0)),
                ScheduleLine::Calc {
                    id: "c".into(),
                    label: "Self".into(),
                    add: vec!["a".into(), "c".into()],
                    subtract: vec![],
                },
            ],
        )]);
        // the self-reference contributes zero, the rest still evaluates
        assert_eq!(doc.computed_values().get("c"), Some(&3.0));
    }

    #[test]
    fn mutual_cycle_does_not_hang() {
        let doc = schedule(vec![section(
            "Loop",
            vec![
                ScheduleLine::Calc {
                    id: "x".into(),
                    label: "X".into(),
                    add: vec!["y".into()],
                    subtract: vec![],
                },
                ScheduleLine::Calc {
                    id: "y".into(),
                    label: "Y".into(),
                    add: vec!["x".into()],
                    subtract: vec![],
                },
            ],
        )]);
        let values = doc.computed_values();
        assert_eq!(values.get("x"), Some(&0.0));
        assert_eq!(values.get("y"), Some(&0.0));
    }

    #[test]
    fn unknown_reference_contributes_zero() {
        let doc = schedule(vec![section(
            "Sparse",
            vec![
                input("a", Some(5.0)),
                ScheduleLine::Total {
                    id: "t".into(),
                    label: "Total".into(),
                    sum_of: vec!["a".into(), "ghost".into()],
                },
            ],
        )]);
        assert_eq!(doc.computed_values().get("t"), Some(&5.0));
    }

    #[test]
    fn roll_forward_clears_inputs_but_keeps_definitions() {
        let doc = ScheduleDoc::SimpleSchedule(SimpleSchedule {
            attachments: vec![Attachment {
                id: "att-1".into(),
                name: "bank-letter.pdf".into(),
                url: Some("https://files.example/bank-letter.pdf".into()),
            }],
            sections: vec![Section {
                title: "Balances".into(),
                notes: Some("agreed to statement".into()),
                lines: vec![
                    input("cash", Some(1200.0)),
                    ScheduleLine::Total {
                        id: "t".into(),
                        label: "Total".into(),
                        sum_of: vec!["cash".into()],
                    },
                ],
            }],
        });
        let next = doc.rolled_forward();
        let ScheduleDoc::SimpleSchedule(next) = next else {
            panic!("kind must be preserved");
        };
        assert_eq!(next.attachments[0].id, "att-1");
        assert_eq!(next.attachments[0].url, None);
        assert_eq!(next.sections[0].notes.as_deref(), Some(""));
        assert!(matches!(
            next.sections[0].lines[0],
            ScheduleLine::Input { amount: None, .. }
        ));
        assert!(matches!(
            next.sections[0].lines[1],
            ScheduleLine::Total { .. }
        ));
    }

    #[test]
    fn roll_forward_resets_checklist_responses() {
        let doc = ScheduleDoc::Checklist(Checklist {
            rows: vec![
                ChecklistRow {
                    id: "r1".into(),
                    text: "Cast the schedule".into(),
                    response: Some(ChecklistResponse::Agreed),
                },
                ChecklistRow {
                    id: "r2".into(),
                    text: "Agree to ledger".into(),
                    response: Some(ChecklistResponse::NotApplicable),
                },
            ],
        });
        let ScheduleDoc::Checklist(next) = doc.rolled_forward() else {
            panic!("kind must be preserved");
        };
        assert!(next.rows.iter().all(|row| row.response.is_none()));
        assert_eq!(next.rows[0].id, "r1");
        assert_eq!(next.rows[1].text, "Agree to ledger");
    }

    #[test]
    fn checklist_serializes_with_wire_tags() {
        let doc = ScheduleDoc::Checklist(Checklist {
            rows: vec![ChecklistRow {
                id: "r1".into(),
                text: "Cast".into(),
                response: Some(ChecklistResponse::NotApplicable),
            }],
        });
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["kind"], "CHECKLIST");
        assert_eq!(json["rows"][0]["response"], "NA");
    }
}
