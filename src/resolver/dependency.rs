//! Dependency ordering
//!
//! Depth-first visit over all case ids. A case is appended only after all of
//! its dependencies, so the result lists every dependency before its
//! dependents. Roots are visited in id order, which keeps the order stable.

use std::collections::{BTreeMap, HashMap};

use crate::models::{SuiteError, TestCase};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

struct Visitor<'a> {
    cases: &'a BTreeMap<String, TestCase>,
    marks: HashMap<&'a str, Mark>,
    path: Vec<&'a str>,
    order: Vec<String>,
}

impl<'a> Visitor<'a> {
    fn visit(&mut self, id: &'a str, dependent: Option<&'a str>) -> Result<(), SuiteError> {
        match self.marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                let start = self.path.iter().position(|p| *p == id).unwrap_or(0);
                let mut cycle: Vec<String> =
                    self.path[start..].iter().map(|p| p.to_string()).collect();
                cycle.push(id.to_string());
                return Err(SuiteError::CyclicDependency { cycle });
            }
            None => {}
        }

        let cases = self.cases;
        let case = cases
            .get(id)
            .ok_or_else(|| SuiteError::UnresolvedDependency {
                case: dependent.unwrap_or(id).to_string(),
                missing: id.to_string(),
            })?;

        self.marks.insert(id, Mark::InProgress);
        self.path.push(id);

        for dep in &case.dependencies {
            self.visit(dep, Some(id))?;
        }

        self.path.pop();
        self.marks.insert(id, Mark::Done);
        self.order.push(id.to_string());
        Ok(())
    }
}

/// Order case ids so that each case follows all of its dependencies
pub fn execution_order(cases: &BTreeMap<String, TestCase>) -> Result<Vec<String>, SuiteError> {
    let mut visitor = Visitor {
        cases,
        marks: HashMap::with_capacity(cases.len()),
        path: Vec::new(),
        order: Vec::with_capacity(cases.len()),
    };

    for id in cases.keys() {
        visitor.visit(id, None)?;
    }

    Ok(visitor.order)
}
