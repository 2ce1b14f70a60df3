//! `link-package-product`: link a Swift package product into a target's
//! Frameworks build phase.

use pbxpatch_core::locate::{find_entry_by_token, find_list_field};
use pbxpatch_core::splice::insert_list_value;
use pbxpatch_core::Result;
use serde::{Deserialize, Serialize};

use super::{
    display_name, ensure_listed, entries_of_isa, find_with_isa, insert_into_section, isa,
    quote_if_needed, reference,
};
use crate::script::{PatchRun, PatchTask, Progress};

/// Link `product` into a Frameworks build phase.
///
/// The phase is the anchor of the whole edit: if it cannot be located the
/// run aborts and nothing is written.
///
/// Creates, when missing, an `XCSwiftPackageProductDependency` for the
/// product and a `PBXBuildFile` labelled `<product> in Frameworks` that
/// points at it through `productRef`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkPackageProduct {
    /// Token of the target's `PBXFrameworksBuildPhase`.
    pub frameworks_phase: String,
    /// Package product name, e.g. `Testing`.
    pub product: String,
    /// Token of the `XCRemoteSwiftPackageReference` providing the product.
    #[serde(default)]
    pub package: Option<String>,
    /// Token of a target whose `packageProductDependencies` should list
    /// the product.
    #[serde(default)]
    pub target: Option<String>,
    /// Link weakly (`ATTRIBUTES = (Weak, )`).
    #[serde(default)]
    pub weak: bool,
}

impl LinkPackageProduct {
    fn build_file_label(&self) -> String {
        format!("{} in Frameworks", self.product)
    }

    fn dependency_text(&self, token: &str, package: Option<&(String, String)>) -> String {
        let mut text = format!(
            "\t\t{} = {{\n\t\t\tisa = {};\n",
            reference(token, &self.product),
            isa::PACKAGE_PRODUCT_DEPENDENCY
        );
        if let Some((pkg, label)) = package {
            text.push_str(&format!("\t\t\tpackage = {};\n", reference(pkg, label)));
        }
        text.push_str(&format!(
            "\t\t\tproductName = {};\n\t\t}};",
            quote_if_needed(&self.product)
        ));
        text
    }

    fn build_file_text(&self, token: &str, dependency: &str) -> String {
        let settings = if self.weak {
            "settings = {ATTRIBUTES = (Weak, ); }; "
        } else {
            ""
        };
        format!(
            "\t\t{} = {{isa = {}; productRef = {}; {settings}}};",
            reference(token, &self.build_file_label()),
            isa::BUILD_FILE,
            reference(dependency, &self.product),
        )
    }
}

impl PatchTask for LinkPackageProduct {
    fn name(&self) -> &str {
        "link-package-product"
    }

    fn operation(&self) -> &str {
        "link_package_product"
    }

    fn apply(&self, run: &mut PatchRun) -> Result<()> {
        run.required("locate Frameworks phase", |cx| {
            let entry = find_with_isa(cx.doc, &self.frameworks_phase, isa::FRAMEWORKS_BUILD_PHASE)?;
            Ok(Progress::found(entry.token, ()))
        })?;

        let package = match &self.package {
            Some(token) => Some(run.required("locate package reference", |cx| {
                let entry = find_entry_by_token(cx.doc, token)?;
                let label = display_name(&entry);
                Ok(Progress::found(label.clone(), (entry.token, label)))
            })?),
            None => None,
        };
        if let Some(target) = &self.target {
            run.required("locate target", |cx| {
                let entry = find_entry_by_token(cx.doc, target)?;
                Ok(Progress::found(display_name(&entry), ()))
            })?;
        }

        let dependency = run.required("package product dependency", |cx| {
            for entry in entries_of_isa(cx.doc, isa::PACKAGE_PRODUCT_DEPENDENCY)? {
                let product = entry.scalar(cx.doc, "productName")?;
                let same_product = product.as_deref() == Some(self.product.as_str());
                let same_package = match &package {
                    Some((pkg, _)) => {
                        entry.scalar(cx.doc, "package")?.as_deref() == Some(pkg.as_str())
                    }
                    None => true,
                };
                if same_product && same_package {
                    return Ok(Progress::found(entry.token.clone(), entry.token));
                }
            }
            let token = cx.ids.generate_unique(cx.doc).into_string();
            insert_into_section(
                cx.doc,
                isa::PACKAGE_PRODUCT_DEPENDENCY,
                &self.dependency_text(&token, package.as_ref()),
            )?;
            Ok(Progress::created(token.clone(), token))
        })?;

        // A product linked into several targets has one build file per
        // phase, so the existing one is looked up through this phase only.
        let label = self.build_file_label();
        let build_file = run.required("build file", |cx| {
            let phase = find_entry_by_token(cx.doc, &self.frameworks_phase)?;
            let files = find_list_field(cx.doc, &phase, "files")?;
            let existing = files
                .items
                .iter()
                .find(|i| i.label.as_deref() == Some(label.as_str()));
            if let Some(item) = existing {
                return Ok(Progress::found(item.value.clone(), item.value.clone()));
            }
            let token = cx.ids.generate_unique(cx.doc).into_string();
            let text = self.build_file_text(&token, &dependency);
            insert_into_section(cx.doc, isa::BUILD_FILE, &text)?;
            Ok(Progress::created(token.clone(), token))
        })?;

        run.required("add to Frameworks phase files", |cx| {
            let phase = find_entry_by_token(cx.doc, &self.frameworks_phase)?;
            let files = find_list_field(cx.doc, &phase, "files")?;
            let edit = insert_list_value(cx.doc, &files, &reference(&build_file, &label))?;
            Ok(Progress::inserted(edit, &build_file))
        })?;

        if let Some(target) = &self.target {
            run.required("add to target packageProductDependencies", |cx| {
                let edit = ensure_listed(
                    cx.doc,
                    target,
                    "packageProductDependencies",
                    Some("productName"),
                    &reference(&dependency, &self.product),
                )?;
                Ok(Progress::inserted(edit, &dependency))
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
