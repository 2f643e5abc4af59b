//! Standard launch tasks generated for every new business.

use crate::db::models::{Department, Priority, Task, TaskStatus};

struct Template {
    id: &'static str,
    department: Department,
    title: &'static str,
    description: &'static str,
    priority: Priority,
    hours: u32,
    dependencies: &'static [&'static str],
}

const fn t(
    id: &'static str,
    department: Department,
    title: &'static str,
    description: &'static str,
    priority: Priority,
    hours: u32,
    dependencies: &'static [&'static str],
) -> Template {
    Template {
        id,
        department,
        title,
        description,
        priority,
        hours,
        dependencies,
    }
}

use crate::db::models::Department::*;
use crate::db::models::Priority::{Critical, High, Medium};

const TEMPLATES: &[Template] = &[
    t("tech_001", Technical, "Repository Setup & CI/CD Pipeline",
      "Create GitHub repository, set up CI/CD with automated testing, deployment pipelines",
      Critical, 8, &[]),
    t("tech_002", Technical, "Application Architecture & Database Design",
      "Design system architecture, database schema, API structure",
      Critical, 16, &["tech_001"]),
    t("tech_003", Technical, "Core Application Development",
      "Implement core features, business logic, user authentication, data models",
      High, 80, &["tech_002"]),
    t("tech_004", Technical, "Infrastructure as Code Setup",
      "Create Terraform/CloudFormation templates for cloud infrastructure",
      High, 16, &["tech_002"]),
    t("tech_005", Technical, "Security Implementation",
      "SSL certificates, encryption, access controls, security scanning",
      Critical, 16, &["tech_003"]),
    t("tech_006", Technical, "Monitoring & Analytics Setup",
      "Application monitoring, error tracking, performance analytics, alerting",
      High, 12, &["tech_003"]),
    t("mkt_001", Marketing, "Brand Identity Development",
      "Logo design, brand guidelines, color palette, visual identity",
      High, 20, &[]),
    t("mkt_002", Marketing, "Website Content Creation",
      "Homepage, product pages, about us, blog posts, SEO optimization",
      High, 40, &["mkt_001"]),
    t("mkt_003", Marketing, "SEO/SEM Strategy & Implementation",
      "Keyword research, on-page SEO, Google Ads setup, campaign creation",
      High, 30, &["mkt_002"]),
    t("mkt_004", Marketing, "Social Media Presence Setup",
      "Create profiles, content calendar, initial posts, community management",
      Medium, 16, &["mkt_001"]),
    t("mkt_005", Marketing, "Email Marketing Automation",
      "Email sequences, newsletter campaigns, automation workflows",
      Medium, 20, &["mkt_002"]),
    t("sales_001", Sales, "CRM System Setup",
      "Configure CRM, import contacts, set up pipelines, automation rules",
      High, 12, &[]),
    t("sales_002", Sales, "Sales Funnel Design",
      "Lead capture forms, nurturing sequences, conversion optimization",
      High, 20, &["sales_001"]),
    t("sales_003", Sales, "Proposal Templates & Automation",
      "Create proposal templates, pricing tables, automated generation",
      Medium, 16, &["sales_001"]),
    t("sales_004", Sales, "Lead Generation Campaign",
      "Outbound campaigns, lead qualification, initial outreach",
      High, 30, &["sales_002"]),
    t("legal_001", Legal, "Business Entity Formation",
      "LLC/Corp registration, EIN acquisition, state compliance",
      Critical, 8, &[]),
    t("legal_002", Legal, "Contract Templates",
      "Service agreements, employment contracts, NDAs, vendor agreements",
      High, 20, &["legal_001"]),
    t("legal_003", Legal, "Privacy Policies & Terms",
      "GDPR/CCPA compliant privacy policy, Terms of Service, Cookie policy",
      Critical, 12, &["legal_001"]),
    t("legal_004", Legal, "Intellectual Property Protection",
      "Trademark registration, copyright protection, IP strategy",
      Medium, 16, &["legal_001"]),
    t("fin_001", Finance, "Business Banking Setup",
      "Open business bank account, merchant processing, payment gateway",
      Critical, 8, &["legal_001"]),
    t("fin_002", Finance, "Accounting System Setup",
      "Chart of accounts, bookkeeping automation, QuickBooks/Xero setup",
      Critical, 12, &["fin_001"]),
    t("fin_003", Finance, "Invoicing & Payment Processing",
      "Automated invoice generation, payment processing, recurring billing",
      High, 16, &["fin_002"]),
    t("fin_004", Finance, "Financial Reporting & Dashboards",
      "P&L statements, cash flow analysis, KPI dashboards, forecasting",
      High, 20, &["fin_002"]),
    t("ops_001", Operations, "Standard Operating Procedures",
      "Document core processes, workflows, quality standards",
      High, 24, &[]),
    t("ops_002", Operations, "Customer Support Setup",
      "Help desk system, knowledge base, support workflows, ticketing",
      High, 20, &["ops_001"]),
    t("ops_003", Operations, "Vendor Management System",
      "Vendor relationships, contract negotiations, procurement processes",
      Medium, 16, &["ops_001"]),
    t("hr_001", Hr, "Employee Handbook & Policies",
      "HR policies, code of conduct, safety procedures, employee handbook",
      High, 20, &["legal_001"]),
    t("hr_002", Hr, "Recruitment Process Setup",
      "Job posting templates, candidate screening, interview processes",
      Medium, 16, &["hr_001"]),
    t("hr_003", Hr, "Payroll & Benefits Administration",
      "Payroll system setup, benefits management, tax withholding",
      High, 16, &["hr_001", "fin_002"]),
];

/// One-line plan text per department, used when a plan is generated.
pub fn department_outline(department: Department) -> &'static str {
    match department {
        Technical => "Full-stack application, infrastructure, CI/CD, monitoring, security (30-45 days, high priority)",
        Marketing => "Brand development, content creation, SEO/SEM, campaigns, analytics (20-30 days, high priority)",
        Sales => "CRM setup, sales funnels, lead generation, proposals, onboarding (15-25 days, high priority)",
        Legal => "Entity formation, contracts, privacy policies, IP protection, compliance (10-20 days, critical priority)",
        Finance => "Banking, accounting system, invoicing, financial reporting, tax prep (15-20 days, critical priority)",
        Operations => "SOPs, vendor management, quality control, customer support, monitoring (20-30 days, medium priority)",
        Hr => "Recruitment, onboarding, policies, payroll, performance management (15-25 days, medium priority)",
    }
}

/// Builds the pending task list for a business.
///
/// With focus areas, only departments matching at least one area are kept.
/// An empty focus list means every department.
pub fn generate(business_id: &str, focus_areas: &[String]) -> Vec<Task> {
    TEMPLATES
        .iter()
        .filter(|tpl| {
            focus_areas.is_empty()
                || focus_areas.iter().any(|area| tpl.department.matches_focus(area))
        })
        .map(|tpl| {
            let team = tpl.department.team();
            Task {
                id: tpl.id.to_string(),
                session_id: None,
                business_id: Some(business_id.to_string()),
                department: tpl.department,
                title: tpl.title.to_string(),
                description: tpl.description.to_string(),
                assigned_to: team.producer.to_string(),
                reviewed_by: team.reviewer.to_string(),
                priority: tpl.priority,
                estimated_hours: f64::from(tpl.hours),
                status: TaskStatus::Pending,
                progress: None,
                notes: None,
                blockers: None,
                dependencies: tpl.dependencies.iter().map(|d| d.to_string()).collect(),
                delegated_at: None,
                started_at: None,
                updated_at: None,
                completed_at: None,
                actual_hours: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_catalog_covers_all_departments() {
        let tasks = generate("biz_1", &[]);
        assert_eq!(tasks.len(), 29);
        for department in Department::ALL {
            assert!(tasks.iter().any(|t| t.department == *department));
        }
        let hours: f64 = tasks.iter().map(|t| t.estimated_hours).sum();
        assert_eq!(hours, 576.0);
    }

    #[test]
    fn focus_areas_narrow_the_catalog() {
        let tasks = generate("biz_1", &["technical".to_string(), "HR".to_string()]);
        assert_eq!(tasks.len(), 9);
        assert!(tasks
            .iter()
            .all(|t| matches!(t.department, Department::Technical | Department::Hr)));
    }

    #[test]
    fn tasks_carry_team_and_business() {
        let tasks = generate("biz_9", &["legal".to_string()]);
        let first = &tasks[0];
        assert_eq!(first.id, "legal_001");
        assert_eq!(first.assigned_to, "Legal");
        assert_eq!(first.reviewed_by, "ComplianceReview");
        assert_eq!(first.business_id.as_deref(), Some("biz_9"));
    }
}
