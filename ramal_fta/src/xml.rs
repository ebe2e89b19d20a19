//! Open-PSA MEF serialization: a streamed, non-indented writer and a
//! strict reader built on quick-xml.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, XmlError};
use crate::event::{CcfGroup, CcfModel, Node};
use crate::expression::Expr;
use crate::fault_tree::{FaultTree, Symbol};
use crate::gate::{Arg, Formula, GateId, Operator, RawArg, RawFormula};
use crate::name::is_valid_name;

impl FaultTree {
    /// Streams the whole document: XML declaration plus the MEF body.
    pub fn to_xml<W: Write>(&self, out: &mut W, nest: usize) -> io::Result<()> {
        writeln!(out, "<?xml version=\"1.0\"?>")?;
        self.write_mef(out, nest)
    }

    /// Streams the MEF body without the declaration, so callers can put
    /// comment blocks between the declaration and the root element.
    /// Gates come out in topological order, dependencies after their
    /// parents; the `null` operator gets no wrapper element. With
    /// `nest > 0`, private NOT gates are inlined up to that depth.
    pub fn write_mef<W: Write>(&self, out: &mut W, nest: usize) -> io::Result<()> {
        writeln!(out, "<opsa-mef>")?;
        writeln!(out, "<define-fault-tree name=\"{}\">", self.name)?;
        let order = self.toposort();
        let inlined = self.compute_inlined(&order, nest);
        for &gid in &order {
            if inlined.contains(&gid) {
                continue;
            }
            writeln!(out, "<define-gate name=\"{}\">", self.gates[gid].name)?;
            self.write_formula(out, &self.gates[gid].formula, &inlined)?;
            writeln!(out, "</define-gate>")?;
        }
        for group in &self.ccf_groups {
            self.write_ccf_group(out, group)?;
        }
        writeln!(out, "</define-fault-tree>")?;

        let basics = self.non_ccf_events();
        if !basics.is_empty() || !self.house_events.is_empty() || !self.parameters.is_empty() {
            writeln!(out, "<model-data>")?;
            for id in basics {
                let event = &self.basic_events[id];
                writeln!(out, "<define-basic-event name=\"{}\">", event.name)?;
                write_expr(out, &event.prob)?;
                writeln!(out, "</define-basic-event>")?;
            }
            for event in &self.house_events {
                writeln!(out, "<define-house-event name=\"{}\">", event.name)?;
                writeln!(out, "<constant value=\"{}\"/>", event.state)?;
                writeln!(out, "</define-house-event>")?;
            }
            for param in &self.parameters {
                writeln!(out, "<define-parameter name=\"{}\">", param.name)?;
                write_expr(out, &param.expr)?;
                writeln!(out, "</define-parameter>")?;
            }
            writeln!(out, "</model-data>")?;
        }
        writeln!(out, "</opsa-mef>")
    }

    /// Private NOT gates referenced exactly once whose reference site is
    /// within the nesting depth. Processing follows the emission order,
    /// so the marking pass and the writer make identical decisions.
    fn compute_inlined(&self, order: &[GateId], nest: usize) -> HashSet<GateId> {
        let mut inlined = HashSet::new();
        if nest == 0 {
            return inlined;
        }
        let mut refcount: HashMap<GateId, usize> = HashMap::new();
        for gate in &self.gates {
            for child in gate.formula.gate_args() {
                *refcount.entry(child).or_insert(0) += 1;
            }
        }
        let private = |gid: GateId| {
            self.gates[gid].operator() == Operator::Not
                && self.gates[gid].num_parents() == 1
                && refcount.get(&gid) == Some(&1)
        };
        for &gid in order {
            if inlined.contains(&gid) {
                continue;
            }
            let mut stack = vec![(&self.gates[gid].formula, 0usize)];
            while let Some((formula, depth)) = stack.pop() {
                for arg in &formula.args {
                    match arg {
                        Arg::Gate(child) if private(*child) && depth < nest => {
                            if inlined.insert(*child) {
                                stack.push((&self.gates[*child].formula, depth + 1));
                            }
                        }
                        Arg::Formula(nested) => stack.push((nested.as_ref(), depth)),
                        _ => {}
                    }
                }
            }
        }
        inlined
    }

    /// Writes one formula body with an explicit stack; generated NOT
    /// chains can outgrow the host stack.
    fn write_formula<W: Write>(
        &self,
        out: &mut W,
        root: &Formula,
        inlined: &HashSet<GateId>,
    ) -> io::Result<()> {
        enum Op<'a> {
            Begin(&'a Formula),
            End(&'a Formula),
        }

        let mut stack = vec![Op::Begin(root)];
        while let Some(op) = stack.pop() {
            match op {
                Op::End(formula) => {
                    if formula.operator != Operator::Null {
                        writeln!(out, "</{}>", formula.operator)?;
                    }
                }
                Op::Begin(formula) => {
                    match formula.operator {
                        Operator::Null => {}
                        Operator::Atleast => writeln!(
                            out,
                            "<atleast min=\"{}\">",
                            formula.k_num.unwrap_or_default()
                        )?,
                        other => writeln!(out, "<{other}>")?,
                    }
                    for id in formula.house_args() {
                        writeln!(out, "<house-event name=\"{}\"/>", self.house_events[id].name)?;
                    }
                    for id in formula.basic_args() {
                        writeln!(out, "<basic-event name=\"{}\"/>", self.basic_events[id].name)?;
                    }
                    for id in formula.undefined_args() {
                        writeln!(out, "<event name=\"{}\"/>", self.undefined_events[id].name)?;
                    }
                    for id in formula.direct_gate_args() {
                        if !inlined.contains(&id) {
                            writeln!(out, "<gate name=\"{}\"/>", self.gates[id].name)?;
                        }
                    }
                    stack.push(Op::End(formula));
                    let nested: Vec<&Formula> = formula
                        .args
                        .iter()
                        .filter_map(|arg| match arg {
                            Arg::Formula(inner) => Some(inner.as_ref()),
                            Arg::Gate(id) if inlined.contains(id) => {
                                Some(&self.gates[*id].formula)
                            }
                            _ => None,
                        })
                        .collect();
                    for formula in nested.into_iter().rev() {
                        stack.push(Op::Begin(formula));
                    }
                }
            }
        }
        Ok(())
    }

    fn write_ccf_group<W: Write>(&self, out: &mut W, group: &CcfGroup) -> io::Result<()> {
        writeln!(
            out,
            "<define-CCF-group name=\"{}\" model=\"{}\">",
            group.name, group.model
        )?;
        writeln!(out, "<members>")?;
        for &member in &group.members {
            writeln!(
                out,
                "<basic-event name=\"{}\"/>",
                self.basic_events[member].name
            )?;
        }
        writeln!(out, "</members>")?;
        writeln!(out, "<distribution>")?;
        write_expr(out, &group.prob)?;
        writeln!(out, "</distribution>")?;
        writeln!(out, "<factors>")?;
        for (index, factor) in group.factors.iter().enumerate() {
            writeln!(out, "<factor level=\"{}\">", index + 2)?;
            writeln!(out, "<float value=\"{factor}\"/>")?;
            writeln!(out, "</factor>")?;
        }
        writeln!(out, "</factors>")?;
        writeln!(out, "</define-CCF-group>")
    }
}

fn write_expr<W: Write>(out: &mut W, expr: &Expr) -> io::Result<()> {
    match expr {
        Expr::Float(value) => writeln!(out, "<float value=\"{value}\"/>"),
        Expr::Bool(value) => writeln!(out, "<bool value=\"{value}\"/>"),
        Expr::Param(name) => writeln!(out, "<parameter name=\"{name}\"/>"),
        Expr::Neg(arg) => {
            writeln!(out, "<neg>")?;
            write_expr(out, arg)?;
            writeln!(out, "</neg>")
        }
        Expr::Add(args) => write_expr_list(out, "add", args),
        Expr::Sub(args) => write_expr_list(out, "sub", args),
        Expr::Mul(args) => write_expr_list(out, "mul", args),
        Expr::Div(args) => write_expr_list(out, "div", args),
    }
}

fn write_expr_list<W: Write>(out: &mut W, tag: &str, args: &[Expr]) -> io::Result<()> {
    writeln!(out, "<{tag}>")?;
    for arg in args {
        write_expr(out, arg)?;
    }
    writeln!(out, "</{tag}>")
}

/// Reads a MEF document in the strict flow: every reference must
/// resolve, and undefined events are rejected by population.
pub fn from_xml_str(text: &str, multi_top: bool) -> Result<FaultTree, Error> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    let mut fault_tree = FaultTree::new("");
    loop {
        match read_event(&mut reader)? {
            Event::Start(start) => match start.name().as_ref() {
                b"opsa-mef" => parse_document(&mut reader, &mut fault_tree)?,
                other => return Err(unexpected(other, &reader).into()),
            },
            Event::Eof => break,
            _ => {}
        }
    }
    fault_tree.multi_top = multi_top;
    fault_tree.populate(true)?;
    Ok(fault_tree)
}

pub fn from_xml_file(path: impl AsRef<Path>, multi_top: bool) -> Result<FaultTree, Error> {
    let text = fs::read_to_string(path)?;
    from_xml_str(&text, multi_top)
}

fn read_event<'a>(reader: &mut Reader<&'a [u8]>) -> Result<Event<'a>, XmlError> {
    reader.read_event().map_err(|source| XmlError::Syntax {
        position: reader.buffer_position(),
        source,
    })
}

fn unexpected(element: &[u8], reader: &Reader<&[u8]>) -> XmlError {
    XmlError::UnexpectedElement {
        element: String::from_utf8_lossy(element).into_owned(),
        position: reader.buffer_position(),
    }
}

fn attribute(start: &BytesStart, key: &str) -> Result<Option<String>, XmlError> {
    for attr in start.attributes() {
        let attr = attr.map_err(|source| XmlError::Syntax {
            position: 0,
            source: quick_xml::Error::from(source),
        })?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(String::from_utf8_lossy(&attr.value).into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(start: &BytesStart, key: &str) -> Result<String, XmlError> {
    attribute(start, key)?.ok_or_else(|| XmlError::MissingAttribute {
        element: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        attribute: key.to_owned(),
    })
}

fn name_attribute(start: &BytesStart) -> Result<String, XmlError> {
    let name = required_attribute(start, "name")?;
    if !is_valid_name(&name) {
        return Err(XmlError::InvalidName(name));
    }
    Ok(name)
}

fn parse_document(
    reader: &mut Reader<&[u8]>,
    fault_tree: &mut FaultTree,
) -> Result<(), Error> {
    loop {
        match read_event(reader)? {
            Event::Start(start) => match start.name().as_ref() {
                b"define-fault-tree" => {
                    fault_tree.name = name_attribute(&start)?;
                    parse_fault_tree(reader, fault_tree)?;
                }
                b"model-data" => parse_model_data(reader, fault_tree)?,
                other => return Err(unexpected(other, reader).into()),
            },
            Event::End(end) if end.name().as_ref() == b"opsa-mef" => return Ok(()),
            Event::Eof => return Err(XmlError::UnexpectedEof.into()),
            _ => {}
        }
    }
}

fn parse_fault_tree(
    reader: &mut Reader<&[u8]>,
    fault_tree: &mut FaultTree,
) -> Result<(), Error> {
    loop {
        match read_event(reader)? {
            Event::Start(start) => match start.name().as_ref() {
                b"define-gate" => {
                    let name = name_attribute(&start)?;
                    let formula = parse_gate_body(reader)?;
                    fault_tree.add_gate_raw(&name, formula)?;
                }
                b"define-CCF-group" => parse_ccf_group(reader, &start, fault_tree)?,
                other => return Err(unexpected(other, reader).into()),
            },
            Event::End(end) if end.name().as_ref() == b"define-fault-tree" => return Ok(()),
            Event::Eof => return Err(XmlError::UnexpectedEof.into()),
            _ => {}
        }
    }
}

fn operator_from_tag(tag: &[u8]) -> Option<Operator> {
    std::str::from_utf8(tag)
        .ok()
        .and_then(|text| Operator::from_str(text).ok())
}

fn is_reference_tag(tag: &[u8]) -> bool {
    matches!(tag, b"basic-event" | b"house-event" | b"gate" | b"event")
}

/// Parses one gate body up to `</define-gate>`. The formula tree is
/// collected with an explicit frame stack. A body of bare references is
/// the wrapperless `null` form; an explicit `<null>` element is also
/// accepted on re-parse.
fn parse_gate_body(reader: &mut Reader<&[u8]>) -> Result<RawFormula, Error> {
    let mut stack: Vec<RawFormula> = Vec::new();
    let mut completed: Vec<RawArg> = Vec::new();

    fn push_arg(stack: &mut [RawFormula], completed: &mut Vec<RawArg>, arg: RawArg) {
        match stack.last_mut() {
            Some(frame) => frame.args.push(arg),
            None => completed.push(arg),
        }
    }

    loop {
        match read_event(reader)? {
            Event::Start(start) => {
                let tag = start.name();
                if let Some(operator) = operator_from_tag(tag.as_ref()) {
                    let k_num = match operator {
                        Operator::Atleast => {
                            let min = required_attribute(&start, "min")?;
                            Some(min.parse::<usize>().map_err(|_| {
                                XmlError::InvalidValue {
                                    what: "atleast min".to_owned(),
                                    value: min.clone(),
                                }
                            })?)
                        }
                        _ => None,
                    };
                    stack.push(RawFormula::new(operator, k_num));
                } else if is_reference_tag(tag.as_ref()) {
                    let name = name_attribute(&start)?;
                    push_arg(&mut stack, &mut completed, RawArg::Ref(name));
                    reader
                        .read_to_end(tag)
                        .map_err(|source| XmlError::Syntax {
                            position: reader.buffer_position(),
                            source,
                        })?;
                } else {
                    return Err(unexpected(tag.as_ref(), reader).into());
                }
            }
            Event::Empty(start) => {
                let tag = start.name();
                if is_reference_tag(tag.as_ref()) {
                    let name = name_attribute(&start)?;
                    push_arg(&mut stack, &mut completed, RawArg::Ref(name));
                } else {
                    return Err(unexpected(tag.as_ref(), reader).into());
                }
            }
            Event::End(end) => {
                let tag = end.name();
                if tag.as_ref() == b"define-gate" {
                    break;
                }
                if operator_from_tag(tag.as_ref()).is_some() {
                    let done = stack.pop().ok_or(XmlError::UnexpectedEof)?;
                    push_arg(&mut stack, &mut completed, RawArg::Formula(Box::new(done)));
                } else {
                    return Err(unexpected(tag.as_ref(), reader).into());
                }
            }
            Event::Eof => return Err(XmlError::UnexpectedEof.into()),
            _ => {}
        }
    }

    match completed.len() {
        1 => match completed.pop().expect("one completed item") {
            RawArg::Formula(formula) => Ok(*formula),
            reference => {
                let mut formula = RawFormula::new(Operator::Null, None);
                formula.args.push(reference);
                Ok(formula)
            }
        },
        _ => {
            // Multiple direct children only make sense as a wrapperless
            // null body; arity validation rejects the rest.
            let mut formula = RawFormula::new(Operator::Null, None);
            formula.args = completed;
            Ok(formula)
        }
    }
}

fn parse_ccf_group(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
    fault_tree: &mut FaultTree,
) -> Result<(), Error> {
    let group_name = name_attribute(start)?;
    let model_text = required_attribute(start, "model")?;
    let model = CcfModel::from_str(&model_text).map_err(|_| XmlError::InvalidValue {
        what: "CCF model".to_owned(),
        value: model_text,
    })?;
    let mut member_names: Vec<String> = Vec::new();
    let mut prob: Option<Expr> = None;
    let mut factors: Vec<f64> = Vec::new();

    loop {
        match read_event(reader)? {
            Event::Start(section) => match section.name().as_ref() {
                b"members" => loop {
                    match read_event(reader)? {
                        Event::Empty(member) if member.name().as_ref() == b"basic-event" => {
                            member_names.push(name_attribute(&member)?);
                        }
                        Event::Start(member) if member.name().as_ref() == b"basic-event" => {
                            member_names.push(name_attribute(&member)?);
                            reader.read_to_end(member.name()).map_err(|source| {
                                XmlError::Syntax {
                                    position: reader.buffer_position(),
                                    source,
                                }
                            })?;
                        }
                        Event::End(end) if end.name().as_ref() == b"members" => break,
                        Event::Eof => return Err(XmlError::UnexpectedEof.into()),
                        _ => {}
                    }
                },
                b"distribution" => prob = Some(parse_expr(reader, b"distribution")?),
                b"factors" => loop {
                    match read_event(reader)? {
                        Event::Start(factor) if factor.name().as_ref() == b"factor" => {
                            let expr = parse_expr(reader, b"factor")?;
                            let value = expr.as_float().ok_or_else(|| XmlError::InvalidValue {
                                what: "CCF factor".to_owned(),
                                value: format!("{expr:?}"),
                            })?;
                            factors.push(value);
                        }
                        Event::End(end) if end.name().as_ref() == b"factors" => break,
                        Event::Eof => return Err(XmlError::UnexpectedEof.into()),
                        _ => {}
                    }
                },
                other => return Err(unexpected(other, reader).into()),
            },
            Event::End(end) if end.name().as_ref() == b"define-CCF-group" => break,
            Event::Eof => return Err(XmlError::UnexpectedEof.into()),
            _ => {}
        }
    }

    let prob = prob.ok_or_else(|| XmlError::InvalidValue {
        what: format!("distribution of CCF group {group_name}"),
        value: "missing".to_owned(),
    })?;
    let mut members = Vec::with_capacity(member_names.len());
    for member in &member_names {
        let id = match fault_tree.lookup(member) {
            Some(Symbol::Basic(id)) => id,
            // Grouped members are defined by the CCF block itself.
            None => fault_tree.add_basic_event(member, prob.clone())?,
            Some(_) => {
                return Err(crate::error::FaultTreeError::InvalidReference(member.clone()).into())
            }
        };
        members.push(id);
    }
    fault_tree.add_ccf_group(&group_name, model, members, prob, factors)?;
    Ok(())
}

fn parse_model_data(
    reader: &mut Reader<&[u8]>,
    fault_tree: &mut FaultTree,
) -> Result<(), Error> {
    loop {
        match read_event(reader)? {
            Event::Start(start) => match start.name().as_ref() {
                b"define-basic-event" => {
                    let name = name_attribute(&start)?;
                    let expr = parse_expr(reader, b"define-basic-event")?;
                    fault_tree.add_basic_event(&name, expr)?;
                }
                b"define-house-event" => {
                    let name = name_attribute(&start)?;
                    let expr = parse_expr(reader, b"define-house-event")?;
                    let state = match expr {
                        Expr::Bool(state) => state,
                        other => {
                            return Err(XmlError::InvalidValue {
                                what: format!("state of house event {name}"),
                                value: format!("{other:?}"),
                            }
                            .into())
                        }
                    };
                    fault_tree.add_house_event(&name, state)?;
                }
                b"define-parameter" => {
                    let name = name_attribute(&start)?;
                    let expr = parse_expr(reader, b"define-parameter")?;
                    fault_tree.add_parameter(&name, expr)?;
                }
                other => return Err(unexpected(other, reader).into()),
            },
            Event::End(end) if end.name().as_ref() == b"model-data" => return Ok(()),
            Event::Eof => return Err(XmlError::UnexpectedEof.into()),
            _ => {}
        }
    }
}

enum ExprOp {
    Neg,
    Add,
    Sub,
    Mul,
    Div,
}

/// Parses one expression, consuming events up to the end of the
/// enclosing `terminator` element.
fn parse_expr(reader: &mut Reader<&[u8]>, terminator: &[u8]) -> Result<Expr, Error> {
    let mut stack: Vec<(ExprOp, Vec<Expr>)> = Vec::new();
    let mut result: Option<Expr> = None;

    fn attach(
        stack: &mut [(ExprOp, Vec<Expr>)],
        result: &mut Option<Expr>,
        expr: Expr,
    ) -> Result<(), XmlError> {
        match stack.last_mut() {
            Some((_, args)) => {
                args.push(expr);
                Ok(())
            }
            None => {
                if result.is_some() {
                    return Err(XmlError::InvalidValue {
                        what: "expression".to_owned(),
                        value: "more than one root expression".to_owned(),
                    });
                }
                *result = Some(expr);
                Ok(())
            }
        }
    }

    fn leaf(start: &BytesStart) -> Result<Option<Expr>, XmlError> {
        match start.name().as_ref() {
            b"float" => {
                let value = required_attribute(start, "value")?;
                let parsed = value.parse::<f64>().map_err(|_| XmlError::InvalidValue {
                    what: "float value".to_owned(),
                    value: value.clone(),
                })?;
                Ok(Some(Expr::Float(parsed)))
            }
            b"bool" | b"constant" => {
                let value = required_attribute(start, "value")?;
                Ok(Some(Expr::Bool(value == "true")))
            }
            b"parameter" => Ok(Some(Expr::Param(required_attribute(start, "name")?))),
            _ => Ok(None),
        }
    }

    fn expr_op(tag: &[u8]) -> Option<ExprOp> {
        match tag {
            b"neg" => Some(ExprOp::Neg),
            b"add" => Some(ExprOp::Add),
            b"sub" => Some(ExprOp::Sub),
            b"mul" => Some(ExprOp::Mul),
            b"div" => Some(ExprOp::Div),
            _ => None,
        }
    }

    loop {
        match read_event(reader)? {
            Event::Empty(start) => match leaf(&start)? {
                Some(expr) => attach(&mut stack, &mut result, expr)?,
                None => return Err(unexpected(start.name().as_ref(), reader).into()),
            },
            Event::Start(start) => {
                if let Some(op) = expr_op(start.name().as_ref()) {
                    stack.push((op, Vec::new()));
                } else if let Some(expr) = leaf(&start)? {
                    attach(&mut stack, &mut result, expr)?;
                    reader
                        .read_to_end(start.name())
                        .map_err(|source| XmlError::Syntax {
                            position: reader.buffer_position(),
                            source,
                        })?;
                } else {
                    return Err(unexpected(start.name().as_ref(), reader).into());
                }
            }
            Event::End(end) => {
                let tag = end.name();
                if tag.as_ref() == terminator {
                    break;
                }
                if expr_op(tag.as_ref()).is_some() {
                    let (op, mut args) = stack.pop().ok_or(XmlError::UnexpectedEof)?;
                    let expr = match op {
                        ExprOp::Neg => {
                            if args.len() != 1 {
                                return Err(XmlError::InvalidValue {
                                    what: "neg expression".to_owned(),
                                    value: format!("{} arguments", args.len()),
                                }
                                .into());
                            }
                            Expr::Neg(Box::new(args.remove(0)))
                        }
                        ExprOp::Add => Expr::Add(args),
                        ExprOp::Sub => Expr::Sub(args),
                        ExprOp::Mul => Expr::Mul(args),
                        ExprOp::Div => Expr::Div(args),
                    };
                    attach(&mut stack, &mut result, expr)?;
                } else {
                    return Err(unexpected(tag.as_ref(), reader).into());
                }
            }
            Event::Eof => return Err(XmlError::UnexpectedEof.into()),
            _ => {}
        }
    }

    result.ok_or_else(|| {
        XmlError::InvalidValue {
            what: String::from_utf8_lossy(terminator).into_owned(),
            value: "missing expression".to_owned(),
        }
        .into()
    })
}
