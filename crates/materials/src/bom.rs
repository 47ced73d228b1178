use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwise_core::{DomainError, DomainResult, Entity, MAX_QUANTITY, MAX_UNIT_PRICE, UnitOfMeasure, ValidationErrors, typed_id};

use crate::material::MaterialId;

typed_id!(BomId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomLine {
    pub component: MaterialId,
    pub quantity: Decimal,
    pub uom: UnitOfMeasure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBom {
    pub product: MaterialId,
    pub uom: UnitOfMeasure,
    pub labor_cost: Decimal,
    pub machining_cost: Decimal,
    pub lines: Vec<BomLine>,
}

/// Recipe for one unit (`uom`) of `product`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bom {
    id: BomId,
    product: MaterialId,
    uom: UnitOfMeasure,
    labor_cost: Decimal,
    machining_cost: Decimal,
    lines: Vec<BomLine>,
    deleted: bool,
}

/// Fails when `product` is reachable from any of `components`.
///
/// `components_of(m)` returns the components of the BOM whose product is `m`
/// (`None` when `m` has no BOM). Each material is expanded at most once.
pub fn ensure_acyclic<F>(
    product: MaterialId,
    components: impl IntoIterator<Item = MaterialId>,
    components_of: F,
) -> DomainResult<()>
where
    F: Fn(MaterialId) -> Option<Vec<MaterialId>>,
{
    let mut stack: Vec<MaterialId> = components.into_iter().collect();
    let mut visited = HashSet::new();

    while let Some(material) = stack.pop() {
        if material == product {
            return Err(DomainError::field(
                "lines",
                format!("material {product} cannot be a component of itself, directly or through nested BOMs"),
            ));
        }
        if !visited.insert(material) {
            continue;
        }
        if let Some(children) = components_of(material) {
            stack.extend(children);
        }
    }
    Ok(())
}

fn check_lines(errors: &mut ValidationErrors, lines: &[BomLine]) {
    let mut seen = HashSet::new();
    for (idx, line) in lines.iter().enumerate() {
        if line.quantity < Decimal::ZERO {
            errors.push(format!("lines[{idx}].quantity"), "must not be negative");
        } else if line.quantity > MAX_QUANTITY {
            errors.push(format!("lines[{idx}].quantity"), format!("must not exceed {MAX_QUANTITY}"));
        }
        if !seen.insert((line.component, line.uom)) {
            errors.push(format!("lines[{idx}]"), "component and uom already listed");
        }
    }
}

impl Bom {
    pub fn define<F>(id: BomId, input: NewBom, components_of: F) -> DomainResult<Self>
    where
        F: Fn(MaterialId) -> Option<Vec<MaterialId>>,
    {
        let mut errors = ValidationErrors::new();
        for (field, cost) in [("labor_cost", input.labor_cost), ("machining_cost", input.machining_cost)] {
            if cost < Decimal::ZERO {
                errors.push(field, "must not be negative");
            } else if cost > MAX_UNIT_PRICE {
                errors.push(field, format!("must not exceed {MAX_UNIT_PRICE}"));
            }
        }
        check_lines(&mut errors, &input.lines);
        errors.into_result()?;

        ensure_acyclic(input.product, input.lines.iter().map(|l| l.component), components_of)?;

        Ok(Self {
            id,
            product: input.product,
            uom: input.uom,
            labor_cost: input.labor_cost,
            machining_cost: input.machining_cost,
            lines: input.lines,
            deleted: false,
        })
    }

    /// Replaces the component list, re-running the cycle check.
    pub fn replace_lines<F>(&mut self, lines: Vec<BomLine>, components_of: F) -> DomainResult<()>
    where
        F: Fn(MaterialId) -> Option<Vec<MaterialId>>,
    {
        let mut errors = ValidationErrors::new();
        check_lines(&mut errors, &lines);
        errors.into_result()?;
        ensure_acyclic(self.product, lines.iter().map(|l| l.component), components_of)?;
        self.lines = lines;
        Ok(())
    }

    /// Σ(component latest cost × quantity) + labor + machining.
    ///
    /// `None` when there are no lines, any component has no cost in the
    /// line's UOM or the sum does not fit in a decimal.
    pub fn latest_cost<F>(&self, cost_of: F) -> Option<Decimal>
    where
        F: Fn(MaterialId, UnitOfMeasure) -> Option<Decimal>,
    {
        if self.lines.is_empty() {
            return None;
        }
        let mut total = Decimal::ZERO;
        for line in &self.lines {
            let component = cost_of(line.component, line.uom)?.checked_mul(line.quantity)?;
            total = total.checked_add(component)?;
        }
        total.checked_add(self.labor_cost)?.checked_add(self.machining_cost)
    }

    pub fn id_typed(&self) -> BomId {
        self.id
    }

    pub fn product(&self) -> MaterialId {
        self.product
    }

    pub fn uom(&self) -> UnitOfMeasure {
        self.uom
    }

    pub fn labor_cost(&self) -> Decimal {
        self.labor_cost
    }

    pub fn machining_cost(&self) -> Decimal {
        self.machining_cost
    }

    pub fn lines(&self) -> &[BomLine] {
        &self.lines
    }

    pub fn components(&self) -> Vec<MaterialId> {
        self.lines.iter().map(|l| l.component).collect()
    }
}

impl Entity for Bom {
    type Id = BomId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}
